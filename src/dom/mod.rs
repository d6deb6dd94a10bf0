//! The in-memory document abstraction which the rendering engine mutates.
//!
//! Documents are arena-backed trees: nodes live in a flat `Vec` and refer to
//! one another through [`NodeId`] handles, so subtrees can be cloned, spliced
//! and imported across documents without reference-counted pointer graphs.
//! No markup parser is shipped; documents are built programmatically or by an
//! external [`DocumentProvider`] backend.

mod serialize;

pub use serialize::to_markup_string;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RenderingConfig;
use crate::errors::Result;
use crate::metal::MacroDefinition;

/// Namespace prefix for TAL (template attribute language) attributes.
pub const TAL_NAMESPACE: &str = "tal";

/// Namespace prefix for METAL (macro expansion) attributes.
pub const METAL_NAMESPACE: &str = "metal";

/// Handle to a node within one [`Document`] arena.
///
/// Handles are only meaningful for the document which issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The kind of a document node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// An element with a tag name, possibly namespace-prefixed (`metal:block`).
    Element {
        /// The full tag name as written, including any namespace prefix.
        tag: String,
    },
    /// A text node; escaped on serialization.
    Text(String),
    /// Raw markup injected by a `structure` substitution; serialized verbatim.
    RawText(String),
    /// A comment node.
    Comment(String),
}

/// A single attribute upon an element node.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// The local attribute name, without namespace prefix.
    pub name: String,
    /// The namespace prefix, if any.
    pub namespace: Option<String>,
    /// The attribute value.
    pub value: String,
}

impl Attribute {
    /// Creates an un-namespaced attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            value: value.into(),
        }
    }

    /// Creates a namespace-prefixed attribute, such as `tal:content`.
    pub fn namespaced(
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            value: value.into(),
        }
    }

    /// Whether this attribute matches a `(name, namespace)` specification.
    pub fn matches(&self, spec: &AttributeSpec<'_>) -> bool {
        self.name == spec.name && self.namespace.as_deref() == spec.namespace
    }

    /// The attribute name as written, including any namespace prefix.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A `(name, namespace)` specification used to match attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec<'a> {
    /// The local attribute name to match.
    pub name: &'a str,
    /// The namespace prefix to match, or `None` for un-namespaced attributes.
    pub namespace: Option<&'a str>,
}

impl<'a> AttributeSpec<'a> {
    /// A specification matching an un-namespaced attribute.
    pub const fn plain(name: &'a str) -> Self {
        Self {
            name,
            namespace: None,
        }
    }

    /// A specification matching a namespace-prefixed attribute.
    pub const fn namespaced(namespace: &'a str, name: &'a str) -> Self {
        Self {
            name,
            namespace: Some(namespace),
        }
    }

    /// The matched name as it would be written, for error messages.
    pub fn qualified_name(&self) -> String {
        match self.namespace {
            Some(ns) => format!("{ns}:{}", self.name),
            None => self.name.to_owned(),
        }
    }
}

/// A single node within a document arena.
#[derive(Debug, Clone)]
pub struct Node {
    /// What kind of node this is.
    pub kind: NodeKind,
    /// Ordered attribute list; only meaningful for elements.
    pub attributes: Vec<Attribute>,
    /// Whether this node was imported from another document (macro expansion).
    pub is_imported: bool,
    /// Source line number, when the builder or backend knows it.
    pub line: Option<u32>,
    /// Identity of the source document this node originated from.
    pub source: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, source: String) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            is_imported: false,
            line: None,
            source,
            children: Vec::new(),
            parent: None,
        }
    }

    /// True for element nodes.
    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    /// The element tag name, if this node is an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    /// The namespace prefix of the element tag, if there is one.
    pub fn tag_namespace(&self) -> Option<&str> {
        self.tag().and_then(|t| t.split_once(':').map(|(ns, _)| ns))
    }
}

/// An arena-backed mutable document tree.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    nodes: Vec<Node>,
    root: NodeId,
    macros: HashMap<String, Arc<MacroDefinition>>,
}

impl Document {
    /// Creates a document whose root is an element with the given tag.
    pub fn new(name: impl Into<String>, root_tag: impl Into<String>) -> Self {
        let name = name.into();
        let root = Node::new(
            NodeKind::Element {
                tag: root_tag.into(),
            },
            name.clone(),
        );
        Self {
            name,
            nodes: vec![root],
            root: NodeId(0),
            macros: HashMap::new(),
        }
    }

    /// The identity of the source this document was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root node handle.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrows a node.
    ///
    /// # Panics
    /// Panics if the handle was issued by a different document.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutably borrows a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// The ordered children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// The parent of a node, or `None` for the root and detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// The macros defined by this document, discovered via
    /// [`crate::metal::discover_macros`].
    pub fn macros(&self) -> &HashMap<String, Arc<MacroDefinition>> {
        &self.macros
    }

    /// Replaces the macro registry for this document.
    pub fn set_macros(&mut self, macros: HashMap<String, Arc<MacroDefinition>>) {
        self.macros = macros;
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Creates a new detached element node.
    pub fn new_element(&mut self, tag: impl Into<String>) -> NodeId {
        let node = Node::new(NodeKind::Element { tag: tag.into() }, self.name.clone());
        self.push(node)
    }

    /// Creates a new detached text node.
    pub fn new_text(&mut self, text: impl Into<String>) -> NodeId {
        let node = Node::new(NodeKind::Text(text.into()), self.name.clone());
        self.push(node)
    }

    /// Creates a new detached raw-markup node (serialized without escaping).
    pub fn new_raw_text(&mut self, markup: impl Into<String>) -> NodeId {
        let node = Node::new(NodeKind::RawText(markup.into()), self.name.clone());
        self.push(node)
    }

    /// Creates a new detached comment node.
    pub fn new_comment(&mut self, text: impl Into<String>) -> NodeId {
        let node = Node::new(NodeKind::Comment(text.into()), self.name.clone());
        self.push(node)
    }

    /// Appends a detached node as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Inserts a detached node as the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(0, child);
    }

    /// Inserts a detached node immediately before `reference` among its
    /// parent's children.  No-op if `reference` is detached or the root.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        if let Some(parent) = self.nodes[reference.0].parent {
            let children = &mut self.nodes[parent.0].children;
            if let Some(pos) = children.iter().position(|c| *c == reference) {
                children.insert(pos, node);
                self.nodes[node.0].parent = Some(parent);
            }
        }
    }

    /// Detaches a node from its parent.  The node and its subtree become
    /// unreachable from the root; the arena reclaims them when the document
    /// is dropped.
    pub fn remove_node(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Replaces `old` with the given nodes, splicing them into the parent's
    /// child list at the same position.
    pub fn replace_node(&mut self, old: NodeId, replacements: &[NodeId]) {
        let Some(parent) = self.nodes[old.0].parent.take() else {
            return;
        };
        let children = &mut self.nodes[parent.0].children;
        let Some(pos) = children.iter().position(|c| *c == old) else {
            return;
        };
        children.splice(pos..=pos, replacements.iter().copied());
        for r in replacements {
            self.nodes[r.0].parent = Some(parent);
        }
    }

    /// Removes a node but keeps its children, lifting them into the parent's
    /// child list at the node's position.  Returns the lifted children.
    ///
    /// A parentless node (the root) has nowhere to lift into, so the lift is
    /// a no-op there: the node keeps its tag and its children, which are
    /// still returned so callers can keep processing them.
    pub fn omit_node(&mut self, id: NodeId) -> Vec<NodeId> {
        let lifted = self.nodes[id.0].children.clone();
        if self.nodes[id.0].parent.is_some() {
            self.replace_node(id, &lifted);
            self.nodes[id.0].children.clear();
        }
        lifted
    }

    /// Removes every child of a node, detaching them.
    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Deep-copies a subtree within this document; the copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let mut node = self.nodes[id.0].clone();
        node.parent = None;
        let children = std::mem::take(&mut node.children);
        let copy = self.push(node);
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Deep-copies a subtree from another document into this one, marking
    /// every copied node as imported.  The copy is detached.
    pub fn import_subtree(&mut self, other: &Document, id: NodeId) -> NodeId {
        let mut node = other.nodes[id.0].clone();
        node.parent = None;
        node.children.clear();
        node.is_imported = true;
        let copy = self.push(node);
        for child in other.children(id) {
            let child_copy = self.import_subtree(other, *child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Extracts a subtree into a standalone document fragment whose root is a
    /// copy of `id`.  Used to detach macro bodies from their defining
    /// document.
    pub fn fragment(&self, id: NodeId) -> Document {
        let mut fragment = Document {
            name: self.name.clone(),
            nodes: Vec::new(),
            root: NodeId(0),
            macros: HashMap::new(),
        };
        fragment.root = fragment.copy_from(self, id);
        fragment
    }

    fn copy_from(&mut self, other: &Document, id: NodeId) -> NodeId {
        let mut node = other.nodes[id.0].clone();
        node.parent = None;
        node.children.clear();
        let copy = self.push(node);
        for child in other.children(id) {
            let child_copy = self.copy_from(other, *child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// The subtree rooted at `id` in depth-first pre-order, including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// The first attribute of `id` matching the specification.
    pub fn attribute(&self, id: NodeId, spec: &AttributeSpec<'_>) -> Option<&Attribute> {
        self.nodes[id.0].attributes.iter().find(|a| a.matches(spec))
    }

    /// The value of the first attribute of `id` matching the specification.
    pub fn attribute_value(&self, id: NodeId, spec: &AttributeSpec<'_>) -> Option<String> {
        self.attribute(id, spec).map(|a| a.value.clone())
    }

    /// Sets an attribute, replacing any existing attribute with the same
    /// name and namespace.
    pub fn set_attribute(&mut self, id: NodeId, attribute: Attribute) {
        let spec = AttributeSpec {
            name: &attribute.name,
            namespace: attribute.namespace.as_deref(),
        };
        let pos = self.nodes[id.0].attributes.iter().position(|a| a.matches(&spec));
        match pos {
            Some(pos) => self.nodes[id.0].attributes[pos].value = attribute.value,
            None => self.nodes[id.0].attributes.push(attribute),
        }
    }

    /// Removes the first attribute matching the specification; returns
    /// whether anything was removed.
    pub fn remove_attribute(&mut self, id: NodeId, spec: &AttributeSpec<'_>) -> bool {
        let attributes = &mut self.nodes[id.0].attributes;
        match attributes.iter().position(|a| a.matches(spec)) {
            Some(pos) => {
                attributes.remove(pos);
                true
            }
            None => false,
        }
    }

    /// A short human-readable description of a node, for error messages.
    pub fn describe_node(&self, id: NodeId) -> String {
        match &self.nodes[id.0].kind {
            NodeKind::Element { tag } => format!("<{tag}>"),
            NodeKind::Text(_) => "<text node>".to_owned(),
            NodeKind::RawText(_) => "<raw markup node>".to_owned(),
            NodeKind::Comment(_) => "<comment node>".to_owned(),
        }
    }
}

/// A pluggable document backend: reads serialized markup into a [`Document`]
/// and writes a (mutated) [`Document`] back out.
///
/// The core ships no markup parser; hosting applications register a provider
/// to use the byte-stream render entry point.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Parses serialized markup into a document tree.
    async fn read_document(
        &self,
        input: &[u8],
        source_name: &str,
        config: &RenderingConfig,
    ) -> Result<Document>;

    /// Serializes a document tree.
    async fn write_document(&self, document: &Document, config: &RenderingConfig)
    -> Result<Vec<u8>>;
}
