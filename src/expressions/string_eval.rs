//! The `string:` expression dialect: literal text with interpolated
//! placeholders.
//!
//! `$name` interpolates a single root name, `${a/b/c}` interpolates a full
//! path expression, and `$$` escapes a literal dollar sign. Placeholders are
//! always path expressions, whatever the configured default dialect.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{EvaluationScope, ExpressionContext, ExpressionEvaluator};
use crate::errors::{Result, ZptError};
use crate::model::Value;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:(\$)|\{([^{}]*)\}|([A-Za-z0-9_]+))")
        .expect("placeholder pattern is valid")
});

/// Evaluator for the `string:` dialect.
#[derive(Debug, Default)]
pub struct StringExpressionEvaluator;

impl StringExpressionEvaluator {
    /// Creates the evaluator.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExpressionEvaluator for StringExpressionEvaluator {
    async fn evaluate(
        &self,
        expression: &str,
        context: &ExpressionContext,
        scope: &EvaluationScope<'_>,
    ) -> Result<Value> {
        let mut out = String::with_capacity(expression.len());
        let mut last_end = 0;

        for capture in PLACEHOLDER.captures_iter(expression) {
            let whole = capture.get(0).ok_or_else(|| stray_dollar(expression))?;
            push_literal(&mut out, &expression[last_end..whole.start()], expression)?;
            last_end = whole.end();

            if capture.get(1).is_some() {
                out.push('$');
                continue;
            }
            let path = capture
                .get(2)
                .or_else(|| capture.get(3))
                .ok_or_else(|| stray_dollar(expression))?
                .as_str();
            let value = scope
                .registry
                .evaluate(&format!("path:{path}"), context, scope)
                .await?;
            out.push_str(&value.to_string());
        }
        push_literal(&mut out, &expression[last_end..], expression)?;

        Ok(Value::String(out))
    }
}

fn push_literal(out: &mut String, literal: &str, expression: &str) -> Result<()> {
    if literal.contains('$') {
        return Err(stray_dollar(expression));
    }
    out.push_str(literal);
    Ok(())
}

fn stray_dollar(expression: &str) -> ZptError {
    ZptError::CannotParsePath {
        expression: expression.to_owned(),
        reason: "stray `$`; use `$$` for a literal dollar sign".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderingConfig;
    use crate::dom::Document;
    use crate::expressions::path::{PathExpressionEvaluator, ValueResolutionChain};
    use crate::expressions::EvaluatorRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    async fn eval(expression: &str, model: Value) -> Result<Value> {
        let mut context_setup = |_: &mut ExpressionContext| {};
        eval_with(expression, model, &mut context_setup).await
    }

    async fn eval_with(
        expression: &str,
        model: Value,
        setup: &mut dyn FnMut(&mut ExpressionContext),
    ) -> Result<Value> {
        let document = Document::new("t.html", "div");
        let config = RenderingConfig::default();
        let mut registry = EvaluatorRegistry::new();
        registry.register(
            "path",
            Arc::new(PathExpressionEvaluator::new(Arc::new(
                ValueResolutionChain::standard(),
            ))),
        );
        registry.register("string", Arc::new(StringExpressionEvaluator::new()));
        let cancel = CancellationToken::new();
        let scope = EvaluationScope {
            document: &document,
            config: &config,
            registry: &registry,
            cancel: &cancel,
        };
        let mut context = ExpressionContext::root(document.root(), model);
        setup(&mut context);
        StringExpressionEvaluator::new()
            .evaluate(expression, &context, &scope)
            .await
    }

    #[tokio::test]
    async fn interpolates_names_and_paths() {
        let model = Value::from(json!({ "user": { "name": "ada" } }));
        let mut setup = |context: &mut ExpressionContext| {
            context.define_local("count", Value::Int(3));
        };
        let value = eval_with("hello ${here/user/name}, you have $count items", model, &mut setup)
            .await
            .unwrap();
        assert_eq!(value, Value::String("hello ada, you have 3 items".into()));
    }

    #[tokio::test]
    async fn double_dollar_escapes() {
        let value = eval("costs $$5", Value::Nothing).await.unwrap();
        assert_eq!(value, Value::String("costs $5".into()));
    }

    #[tokio::test]
    async fn nothing_interpolates_as_empty_text() {
        let value = eval("a${nothing}b", Value::Nothing).await.unwrap();
        assert_eq!(value, Value::String("ab".into()));
    }

    #[tokio::test]
    async fn stray_dollar_is_rejected() {
        let err = eval("broken $ text", Value::Nothing).await.unwrap_err();
        assert!(matches!(err, ZptError::CannotParsePath { .. }));
    }
}
