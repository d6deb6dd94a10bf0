//! The `not:` expression dialect: boolean coercion plus negation.

use async_trait::async_trait;

use super::{EvaluationScope, ExpressionContext, ExpressionEvaluator};
use crate::errors::Result;
use crate::model::Value;

/// Evaluator for the `not:` dialect.
///
/// The body is evaluated as a complete expression in its own right (it may
/// carry its own prefix, or use the default dialect) and the result's
/// boolean coercion is inverted.
#[derive(Debug, Default)]
pub struct NotExpressionEvaluator;

impl NotExpressionEvaluator {
    /// Creates the evaluator.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExpressionEvaluator for NotExpressionEvaluator {
    async fn evaluate(
        &self,
        expression: &str,
        context: &ExpressionContext,
        scope: &EvaluationScope<'_>,
    ) -> Result<Value> {
        let value = scope.registry.evaluate(expression, context, scope).await?;
        Ok(Value::Bool(!value.is_truthy()))
    }
}
