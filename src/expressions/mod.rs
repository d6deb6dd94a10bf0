//! Expression evaluation: the evaluator seam, the dialect registry and the
//! shared evaluation state threaded through every evaluation.
//!
//! An expression is a string with an optional dialect prefix (`path:`,
//! `string:`, `not:`). The [`EvaluatorRegistry`] routes the body to the
//! evaluator registered for the prefix; expressions with no prefix use the
//! configured default dialect.

pub mod context;
mod not_eval;
pub mod path;
pub mod registry;
mod string_eval;

pub use context::ExpressionContext;
pub use not_eval::NotExpressionEvaluator;
pub use registry::EvaluatorRegistry;
pub use string_eval::StringExpressionEvaluator;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::RenderingConfig;
use crate::dom::Document;
use crate::errors::Result;
use crate::model::Value;

/// Shared, read-only state available to every expression evaluation.
///
/// Borrowed from the rendering pass for the duration of one evaluation; the
/// document borrow is what lets builtins like `attrs` and `template` read the
/// live tree.
pub struct EvaluationScope<'a> {
    /// The document being rendered.
    pub document: &'a Document,
    /// The active rendering configuration.
    pub config: &'a RenderingConfig,
    /// The dialect registry, for evaluators that re-enter evaluation.
    pub registry: &'a EvaluatorRegistry,
    /// Cooperative cancellation for the whole render.
    pub cancel: &'a CancellationToken,
}

/// An evaluator for one expression dialect.
#[async_trait]
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluates an expression body (prefix already stripped) against a
    /// context.
    async fn evaluate(
        &self,
        expression: &str,
        context: &ExpressionContext,
        scope: &EvaluationScope<'_>,
    ) -> Result<Value>;
}

/// Splits a dialect prefix from an expression, if it carries one.
///
/// A prefix is a run of ASCII-alphabetic characters immediately followed by
/// `:`. Anything else (including an empty candidate) means the expression has
/// no prefix and the default dialect applies.
pub fn split_prefix(expression: &str) -> Option<(&str, &str)> {
    let colon = expression.find(':')?;
    let candidate = &expression[..colon];
    if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphabetic()) {
        Some((candidate, &expression[colon + 1..]))
    } else {
        None
    }
}
