//! Part-by-part traversal of a parsed path expression.

use std::future::Future;
use std::pin::Pin;

use super::ast::{AlternateExpression, PathExpression, PathPart};
use super::resolver::{ResolutionTarget, ValueResolutionChain};
use crate::errors::{Result, ZptError};
use crate::expressions::context::ContextValue;
use crate::expressions::{EvaluationScope, ExpressionContext};
use crate::model::Value;

/// Evaluates a parsed path expression against a context.
///
/// Alternates are attempted left to right; the first success wins. When
/// every alternate fails, a lone failure is re-thrown unchanged (so a typo
/// keeps its precise message) and two or more failures are aggregated into
/// one error carrying each attempt's failure in order. Cancellation is
/// checked before each traversal step and is never folded into the
/// aggregate.
///
/// Boxed so that `${...}` interpolations can recurse through it.
pub fn evaluate_path<'a>(
    chain: &'a ValueResolutionChain,
    expression: &'a PathExpression,
    text: &'a str,
    context: &'a ExpressionContext,
    scope: &'a EvaluationScope<'a>,
) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
    Box::pin(async move {
        let mut failures = Vec::new();
        for alternate in &expression.alternates {
            match walk_alternate(chain, alternate, context, scope).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => failures.push(error),
            }
        }
        if failures.len() == 1 {
            return Err(failures.remove(0));
        }
        Err(ZptError::AggregateEvaluation {
            expression: text.to_owned(),
            errors: failures,
        })
    })
}

async fn walk_alternate(
    chain: &ValueResolutionChain,
    alternate: &AlternateExpression,
    context: &ExpressionContext,
    scope: &EvaluationScope<'_>,
) -> Result<Value> {
    let mut position: Option<Value> = None;

    for part in &alternate.parts {
        if scope.cancel.is_cancelled() {
            return Err(ZptError::Cancelled);
        }

        let name = match part {
            PathPart::Named(name) => name.clone(),
            PathPart::Interpolated { text, expression } => {
                // Interpolated names resolve against the same root context,
                // not against the in-progress traversal value.
                evaluate_path(chain, expression, text, context, scope)
                    .await?
                    .to_string()
            }
        };

        let target = match &position {
            None => ResolutionTarget::Context(context),
            Some(value) => ResolutionTarget::Value(value),
        };
        position = Some(chain.resolve(target, &name, scope).await?);
    }

    match position {
        Some(value) => Ok(value),
        // Zero parts: the root object itself, captured as a value.
        None => Ok(Value::object(ContextValue::new(context.clone()))),
    }
}
