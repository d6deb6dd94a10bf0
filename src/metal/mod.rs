//! The METAL macro language: reusable markup with named slots.
//!
//! A macro is a subtree marked `metal:define-macro`; a use site
//! (`metal:use-macro`) is replaced by a copy of the macro's body with the
//! use site's `metal:fill-slot` subtrees substituted for the macro's
//! matching `metal:define-slot` elements. A macro may extend another
//! (`metal:extend-macro`), forming a chain resolved outermost-first before
//! the use site's own fillers apply.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::dom::{Attribute, AttributeSpec, Document, NodeId, METAL_NAMESPACE};
use crate::errors::{Result, ZptError};
use crate::expressions::{EvaluationScope, ExpressionContext};
use crate::model::Value;
use crate::rendering::{ContextProcessor, ProcessingResult, RenderScope};

const DEFINE_MACRO: AttributeSpec<'static> =
    AttributeSpec::namespaced(METAL_NAMESPACE, "define-macro");
const USE_MACRO: AttributeSpec<'static> = AttributeSpec::namespaced(METAL_NAMESPACE, "use-macro");
const EXTEND_MACRO: AttributeSpec<'static> =
    AttributeSpec::namespaced(METAL_NAMESPACE, "extend-macro");
const DEFINE_SLOT: AttributeSpec<'static> =
    AttributeSpec::namespaced(METAL_NAMESPACE, "define-slot");
const FILL_SLOT: AttributeSpec<'static> = AttributeSpec::namespaced(METAL_NAMESPACE, "fill-slot");

/// A reusable macro: a named, detached copy of its defining subtree.
#[derive(Debug)]
pub struct MacroDefinition {
    name: String,
    body: Document,
}

impl MacroDefinition {
    /// Creates a definition from a detached body fragment.
    pub fn new(name: impl Into<String>, body: Document) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// The macro's name, unique within its defining document.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The macro's body fragment.
    pub fn body(&self) -> &Document {
        &self.body
    }

    /// The macro's identity across documents, used for cycle detection.
    pub fn key(&self) -> String {
        format!("{}#{}", self.body.name(), self.name)
    }
}

/// Collects every macro defined in a document, keyed by name.
///
/// These become reachable through the `template/macros/<name>` builtin.
pub fn discover_macros(document: &Document) -> HashMap<String, Arc<MacroDefinition>> {
    let mut macros = HashMap::new();
    for id in document.descendants(document.root()) {
        if let Some(name) = document.attribute_value(id, &DEFINE_MACRO) {
            let body = document.fragment(id);
            macros.insert(name.clone(), Arc::new(MacroDefinition::new(name, body)));
        }
    }
    macros
}

/// Finds `metal:fill-slot` elements beneath (not including) `root`, keyed by
/// slot name. When nested fillers reuse a name, the outermost wins.
fn collect_slot_fillers(document: &Document, root: NodeId) -> HashMap<String, NodeId> {
    let mut fillers = HashMap::new();
    for id in document.descendants(root).into_iter().skip(1) {
        if let Some(name) = document.attribute_value(id, &FILL_SLOT) {
            fillers.entry(name).or_insert(id);
        }
    }
    fillers
}

/// Finds `metal:define-slot` elements in a macro body, keyed by slot name.
fn find_slots(document: &Document, root: NodeId) -> HashMap<String, NodeId> {
    let mut slots = HashMap::new();
    for id in document.descendants(root) {
        if let Some(name) = document.attribute_value(id, &DEFINE_SLOT) {
            slots.entry(name).or_insert(id);
        }
    }
    slots
}

/// Replaces each matching slot of `target` with a copy of its filler from
/// `source`. Unfilled slots keep their default content; fillers with no
/// matching slot are ignored.
fn fill_slots(target: &mut Document, source: &Document, fillers: &HashMap<String, NodeId>) {
    let slots = find_slots(target, target.root());
    for name in fillers.keys() {
        if !slots.contains_key(name) {
            debug!("no slot matches the filler `{name}`; ignoring it");
        }
    }
    for (name, slot) in slots {
        let Some(filler) = fillers.get(&name) else {
            continue;
        };
        let imported = target.import_subtree(source, *filler);
        // A slot element may itself fill a slot of a further macro up the
        // extension chain; the replacement inherits that role.
        if let Some(outer) = target.attribute_value(slot, &FILL_SLOT) {
            target.set_attribute(
                imported,
                Attribute::namespaced(METAL_NAMESPACE, "fill-slot", outer),
            );
        }
        target.replace_node(slot, &[imported]);
    }
}

/// Resolves a macro's extension chain into a single ready-to-fill body.
///
/// Walks `metal:extend-macro` links, filling each extended macro's slots
/// with the extending macro's fillers; the outermost base becomes the
/// skeleton. Fails fast on a cyclic chain.
async fn resolve_extension_chain(
    definition: &MacroDefinition,
    context: &ExpressionContext,
    scope: &EvaluationScope<'_>,
) -> Result<Document> {
    let mut current = definition.body().clone();
    let mut seen = vec![definition.key()];
    loop {
        let Some(expression) = current.attribute_value(current.root(), &EXTEND_MACRO) else {
            break;
        };
        let value = scope.registry.evaluate(&expression, context, scope).await?;
        let Value::Macro(parent) = value else {
            return Err(ZptError::MacroNotFound { expression });
        };
        if seen.contains(&parent.key()) {
            return Err(ZptError::MacroCycle {
                name: parent.name().to_owned(),
                stack: seen,
            });
        }
        seen.push(parent.key());
        debug!("extending macro `{}` into `{}`", seen[seen.len() - 2], parent.key());

        let fillers = collect_slot_fillers(&current, current.root());
        let mut skeleton = parent.body().clone();
        fill_slots(&mut skeleton, &current, &fillers);
        current = skeleton;
    }
    Ok(current)
}

/// The processor which expands `metal:use-macro` sites.
///
/// Runs before TAL so that the expanded markup, not the use site's
/// placeholder content, is what the rest of the pipeline sees.
#[derive(Debug, Default)]
pub struct MacroUsageProcessor;

impl MacroUsageProcessor {
    /// Creates the processor.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContextProcessor for MacroUsageProcessor {
    async fn process_context(
        &self,
        document: &mut Document,
        context: &mut ExpressionContext,
        scope: &RenderScope<'_>,
    ) -> Result<ProcessingResult> {
        let node = context.node;
        if !document.node(node).is_element() {
            return Ok(ProcessingResult::noop());
        }
        let Some(expression) = document.attribute_value(node, &USE_MACRO) else {
            return Ok(ProcessingResult::noop());
        };

        let (skeleton, key) = {
            let eval = EvaluationScope {
                document: &*document,
                config: scope.config,
                registry: scope.registry,
                cancel: scope.cancel,
            };
            let value = scope.registry.evaluate(&expression, context, &eval).await?;
            let Value::Macro(definition) = value else {
                return Err(ZptError::MacroNotFound { expression });
            };
            let key = definition.key();
            if context.expansion_stack.contains(&key) {
                return Err(ZptError::MacroCycle {
                    name: definition.name().to_owned(),
                    stack: context.expansion_stack.clone(),
                });
            }
            debug!("expanding macro `{key}` at {}", document.describe_node(node));
            let skeleton = resolve_extension_chain(&definition, context, &eval).await?;
            (skeleton, key)
        };

        let fillers = collect_slot_fillers(document, node);
        let mut skeleton = skeleton;
        fill_slots(&mut skeleton, document, &fillers);

        let replacement = document.import_subtree(&skeleton, skeleton.root());
        document.replace_node(node, &[replacement]);

        let mut child = context.create_child(replacement);
        child.expansion_stack.push(key);
        Ok(ProcessingResult::with_additional_contexts(vec![child]))
    }
}
