//! The TAL attribute language: the directives which drive document mutation.
//!
//! On each element the directives apply in TAL's fixed order: `define`,
//! `condition`, `repeat`, `content`/`replace`, `attributes`, `omit-tag`.
//! `on-error` is not part of the forward order; it participates through the
//! driver's error-unwinding path instead.

pub mod repeat;

pub use repeat::RepetitionInfo;

use async_trait::async_trait;
use indexmap::IndexMap;
use log::debug;

use crate::dom::{Attribute, AttributeSpec, Document, NodeId, TAL_NAMESPACE};
use crate::errors::{Result, ZptError};
use crate::expressions::{EvaluationScope, ExpressionContext};
use crate::model::Value;
use crate::rendering::{
    ContextProcessor, ErrorHandlingResult, ProcessingResult, RenderScope,
};

const DEFINE: AttributeSpec<'static> = AttributeSpec::namespaced(TAL_NAMESPACE, "define");
const CONDITION: AttributeSpec<'static> = AttributeSpec::namespaced(TAL_NAMESPACE, "condition");
const REPEAT: AttributeSpec<'static> = AttributeSpec::namespaced(TAL_NAMESPACE, "repeat");
const CONTENT: AttributeSpec<'static> = AttributeSpec::namespaced(TAL_NAMESPACE, "content");
const REPLACE: AttributeSpec<'static> = AttributeSpec::namespaced(TAL_NAMESPACE, "replace");
const ATTRIBUTES: AttributeSpec<'static> = AttributeSpec::namespaced(TAL_NAMESPACE, "attributes");
const OMIT_TAG: AttributeSpec<'static> = AttributeSpec::namespaced(TAL_NAMESPACE, "omit-tag");
const ON_ERROR: AttributeSpec<'static> = AttributeSpec::namespaced(TAL_NAMESPACE, "on-error");

/// The processor for TAL attributes.
#[derive(Debug, Default)]
pub struct TalProcessor;

impl TalProcessor {
    /// Creates the processor.
    pub fn new() -> Self {
        Self
    }

    async fn evaluate(
        document: &Document,
        context: &ExpressionContext,
        scope: &RenderScope<'_>,
        expression: &str,
    ) -> Result<Value> {
        let eval = EvaluationScope {
            document,
            config: scope.config,
            registry: scope.registry,
            cancel: scope.cancel,
        };
        scope.registry.evaluate(expression, context, &eval).await
    }

    fn invalid(
        document: &Document,
        node: NodeId,
        spec: &AttributeSpec<'_>,
        reason: impl Into<String>,
    ) -> ZptError {
        ZptError::InvalidAttribute {
            attribute: spec.qualified_name(),
            element: document.node(node).tag().unwrap_or("?").to_owned(),
            reason: reason.into(),
        }
    }

    async fn handle_define(
        text: &str,
        document: &mut Document,
        context: &mut ExpressionContext,
        scope: &RenderScope<'_>,
    ) -> Result<()> {
        for item in split_definitions(text) {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (scope_word, rest) = split_word(item);
            let (global, binding) = match scope_word {
                "global" => (true, rest),
                "local" => (false, rest),
                _ => (false, item),
            };
            let (name, expression) = split_word(binding);
            if name.is_empty() || expression.is_empty() {
                return Err(Self::invalid(
                    document,
                    context.node,
                    &DEFINE,
                    format!("definition `{item}` is not of the form `[local|global] name expression`"),
                ));
            }
            let value = Self::evaluate(document, context, scope, expression).await?;
            if global {
                context.define_global(name, value);
            } else {
                context.define_local(name, value);
            }
        }
        Ok(())
    }

    async fn handle_repeat(
        text: &str,
        document: &mut Document,
        context: &ExpressionContext,
        scope: &RenderScope<'_>,
    ) -> Result<ProcessingResult> {
        let node = context.node;
        let (name, expression) = split_word(text.trim());
        if name.is_empty() || expression.is_empty() {
            return Err(Self::invalid(
                document,
                node,
                &REPEAT,
                "expected `name expression`",
            ));
        }

        let value = Self::evaluate(document, context, scope, expression).await?;
        if value.is_default() {
            // Abort token: keep the element and its content untouched.
            return Ok(ProcessingResult::noop());
        }
        if value.is_nothing() {
            document.remove_node(node);
            return Ok(ProcessingResult::without_children());
        }
        let Some(items) = value.iter_items() else {
            return Err(Self::invalid(
                document,
                node,
                &REPEAT,
                format!("{} is not iterable", value.describe()),
            ));
        };

        let length = items.len();
        debug!("repeating {} over {length} items", document.describe_node(node));
        let mut contexts = Vec::with_capacity(length);
        for (index, item) in items.into_iter().enumerate() {
            let iteration = document.clone_subtree(node);
            document.remove_attribute(iteration, &REPEAT);
            document.insert_before(node, iteration);

            let mut child = context.create_child(iteration);
            child.define_local(name, item);
            child.set_repetition(name, Value::object(RepetitionInfo::new(index, length)));
            contexts.push(child);
        }
        document.remove_node(node);
        Ok(ProcessingResult::with_additional_contexts(contexts))
    }

    /// Handles `tal:content` and `tal:replace`. Returns the walk verdict for
    /// `replace` (the element is gone), or `None` when later directives
    /// still apply; `children_done` records whether content was substituted.
    async fn handle_content_or_replace(
        text: &str,
        is_replace: bool,
        document: &mut Document,
        context: &ExpressionContext,
        scope: &RenderScope<'_>,
        children_done: &mut bool,
    ) -> Result<Option<ProcessingResult>> {
        let node = context.node;
        let (expression, structure) = split_substitution(text);
        let value = Self::evaluate(document, context, scope, expression).await?;

        if value.is_default() {
            // Abort token: the markup's existing content stands.
            return Ok(None);
        }

        if is_replace {
            if value.is_nothing() {
                document.remove_node(node);
            } else {
                let rendered = value.to_string();
                let replacement = if structure {
                    document.new_raw_text(rendered)
                } else {
                    document.new_text(rendered)
                };
                document.replace_node(node, &[replacement]);
            }
            return Ok(Some(ProcessingResult::without_children()));
        }

        document.clear_children(node);
        if !value.is_nothing() {
            let rendered = value.to_string();
            let child = if structure {
                document.new_raw_text(rendered)
            } else {
                document.new_text(rendered)
            };
            document.append_child(node, child);
        }
        *children_done = true;
        Ok(None)
    }

    async fn handle_attributes(
        text: &str,
        document: &mut Document,
        context: &ExpressionContext,
        scope: &RenderScope<'_>,
    ) -> Result<()> {
        let node = context.node;
        for item in split_definitions(text) {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (name, expression) = split_word(item);
            if name.is_empty() || expression.is_empty() {
                return Err(Self::invalid(
                    document,
                    node,
                    &ATTRIBUTES,
                    format!("assignment `{item}` is not of the form `name expression`"),
                ));
            }

            let value = Self::evaluate(document, context, scope, expression).await?;
            if value.is_default() {
                continue;
            }

            let (namespace, local) = match name.split_once(':') {
                Some((ns, local)) => (Some(ns), local),
                None => (None, name),
            };
            let spec = AttributeSpec {
                name: local,
                namespace,
            };
            match value {
                Value::Nothing | Value::Bool(false) => {
                    document.remove_attribute(node, &spec);
                }
                Value::Bool(true) => {
                    let attribute = match namespace {
                        Some(ns) => Attribute::namespaced(ns, local, local),
                        None => Attribute::new(local, local),
                    };
                    document.set_attribute(node, attribute);
                }
                other => {
                    let attribute = match namespace {
                        Some(ns) => Attribute::namespaced(ns, local, other.to_string()),
                        None => Attribute::new(local, other.to_string()),
                    };
                    document.set_attribute(node, attribute);
                }
            }
        }
        Ok(())
    }

    async fn omit_requested(
        document: &Document,
        context: &ExpressionContext,
        scope: &RenderScope<'_>,
    ) -> Result<bool> {
        let Some(text) = document.attribute_value(context.node, &OMIT_TAG) else {
            return Ok(false);
        };
        if text.trim().is_empty() {
            return Ok(true);
        }
        let value = Self::evaluate(document, context, scope, &text).await?;
        Ok(value.is_truthy())
    }
}

#[async_trait]
impl ContextProcessor for TalProcessor {
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

        if let Some(text) = document.attribute_value(node, &DEFINE) {
            Self::handle_define(&text, document, context, scope).await?;
        }

        if let Some(text) = document.attribute_value(node, &CONDITION) {
            let value = Self::evaluate(document, context, scope, &text).await?;
            if !value.is_truthy() {
                document.remove_node(node);
                return Ok(ProcessingResult::without_children());
            }
        }

        if let Some(text) = document.attribute_value(node, &REPEAT) {
            return Self::handle_repeat(&text, document, context, scope).await;
        }

        let content = document.attribute_value(node, &CONTENT);
        let replace = document.attribute_value(node, &REPLACE);
        if content.is_some() && replace.is_some() {
            return Err(Self::invalid(
                document,
                node,
                &CONTENT,
                "an element may not carry both content and replacement directives",
            ));
        }

        let mut children_done = false;
        if let Some(text) = content {
            if let Some(result) = Self::handle_content_or_replace(
                &text,
                false,
                document,
                context,
                scope,
                &mut children_done,
            )
            .await?
            {
                return Ok(result);
            }
        } else if let Some(text) = replace {
            if let Some(result) = Self::handle_content_or_replace(
                &text,
                true,
                document,
                context,
                scope,
                &mut children_done,
            )
            .await?
            {
                return Ok(result);
            }
        }

        if let Some(text) = document.attribute_value(node, &ATTRIBUTES) {
            Self::handle_attributes(&text, document, context, scope).await?;
        }

        if Self::omit_requested(document, context, scope).await? {
            let lifted = document.omit_node(node);
            if children_done {
                return Ok(ProcessingResult::without_children());
            }
            let contexts = lifted
                .into_iter()
                .map(|child| context.create_child(child))
                .collect();
            return Ok(ProcessingResult::with_additional_contexts(contexts));
        }

        if children_done {
            return Ok(ProcessingResult::without_children());
        }
        Ok(ProcessingResult::noop())
    }

    async fn handle_error(
        &self,
        document: &mut Document,
        context: &mut ExpressionContext,
        error: &ZptError,
        scope: &RenderScope<'_>,
    ) -> Result<ErrorHandlingResult> {
        let node = context.node;
        if !document.node(node).is_element() {
            return Ok(ErrorHandlingResult::Unhandled);
        }
        let Some(text) = document.attribute_value(node, &ON_ERROR) else {
            return Ok(ErrorHandlingResult::Unhandled);
        };
        debug!(
            "handling error at {}: {error}",
            document.describe_node(node)
        );

        let mut details = IndexMap::new();
        details.insert("message".to_owned(), Value::String(error.to_string()));
        context.error = Some(Value::Map(details));

        let (expression, structure) = split_substitution(&text);
        let value = Self::evaluate(document, context, scope, expression).await?;

        if !value.is_default() {
            document.clear_children(node);
            if !value.is_nothing() {
                let rendered = value.to_string();
                let child = if structure {
                    document.new_raw_text(rendered)
                } else {
                    document.new_text(rendered)
                };
                document.append_child(node, child);
            }
        }
        Ok(ErrorHandlingResult::Handled)
    }
}

/// Splits a `;`-separated directive value, honoring the `;;` escape for a
/// literal semicolon.
fn split_definitions(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ';' {
            if chars.peek() == Some(&';') {
                chars.next();
                current.push(';');
            } else {
                items.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    items.push(current);
    items
}

/// Splits the first whitespace-delimited word from the remainder.
fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

/// Splits an optional leading `text`/`structure` modifier from a
/// substitution expression. `structure` injects raw markup.
fn split_substitution(text: &str) -> (&str, bool) {
    let trimmed = text.trim();
    let (word, rest) = split_word(trimmed);
    match word {
        "structure" if !rest.is_empty() => (rest, true),
        "text" if !rest.is_empty() => (rest, false),
        _ => (trimmed, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn semicolon_escape_yields_literal_semicolons() {
        assert_eq!(
            split_definitions("a x;;y; b z"),
            vec!["a x;y".to_owned(), " b z".to_owned()]
        );
    }

    #[test]
    fn substitution_modifiers() {
        assert_eq!(split_substitution("here/x"), ("here/x", false));
        assert_eq!(split_substitution("text here/x"), ("here/x", false));
        assert_eq!(split_substitution("structure here/x"), ("here/x", true));
        assert_eq!(split_substitution("structure"), ("structure", false));
    }
}
