//! A minimal markup writer for the in-memory tree.
//!
//! This is the built-in fallback used by [`crate::engine::ZptEngine`] when no
//! external [`super::DocumentProvider`] backend is registered for output.

use super::{Document, NodeId, NodeKind};

/// Serializes a document to a markup string.
///
/// Text nodes are entity-escaped; raw-markup nodes are written verbatim.
/// Elements without children are self-closed.
pub fn to_markup_string(document: &Document) -> String {
    let mut out = String::new();
    write_node(document, document.root(), &mut out);
    out
}

fn write_node(document: &Document, id: NodeId, out: &mut String) {
    let node = document.node(id);
    match &node.kind {
        NodeKind::Element { tag } => {
            out.push('<');
            out.push_str(tag);
            for attribute in &node.attributes {
                out.push(' ');
                out.push_str(&attribute.qualified_name());
                out.push_str("=\"");
                out.push_str(&escape_attribute(&attribute.value));
                out.push('"');
            }
            let children = document.children(id);
            if children.is_empty() {
                out.push_str(" />");
            } else {
                out.push('>');
                for child in children {
                    write_node(document, *child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        NodeKind::Text(text) => out.push_str(&escape_text(text)),
        NodeKind::RawText(markup) => out.push_str(markup),
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
