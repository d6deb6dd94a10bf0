//! The prefix-to-evaluator registry.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::{split_prefix, EvaluationScope, ExpressionContext, ExpressionEvaluator};
use crate::errors::{Result, ZptError};
use crate::model::Value;

/// Maps dialect prefixes to their evaluators.
///
/// The registry is populated when the engine is built and is not mutated
/// during rendering.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: FxHashMap<String, Arc<dyn ExpressionEvaluator>>,
}

impl EvaluatorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an evaluator for a prefix, replacing any previous one.
    pub fn register(&mut self, prefix: impl Into<String>, evaluator: Arc<dyn ExpressionEvaluator>) {
        self.evaluators.insert(prefix.into(), evaluator);
    }

    /// Whether a prefix has a registered evaluator.
    pub fn contains(&self, prefix: &str) -> bool {
        self.evaluators.contains_key(prefix)
    }

    /// Evaluates a full expression, routing on its prefix.
    ///
    /// Expressions without a prefix use the configured default dialect.
    pub async fn evaluate(
        &self,
        expression: &str,
        context: &ExpressionContext,
        scope: &EvaluationScope<'_>,
    ) -> Result<Value> {
        let (prefix, body) = match split_prefix(expression) {
            Some((prefix, body)) => (prefix, body),
            None => (scope.config.default_expression_prefix.as_str(), expression),
        };
        let evaluator =
            self.evaluators
                .get(prefix)
                .ok_or_else(|| ZptError::UnknownExpressionPrefix {
                    prefix: prefix.to_owned(),
                })?;
        evaluator.evaluate(body, context, scope).await
    }
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut prefixes: Vec<&str> = self.evaluators.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        f.debug_struct("EvaluatorRegistry")
            .field("prefixes", &prefixes)
            .finish()
    }
}
