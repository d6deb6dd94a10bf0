//! The `path:` expression dialect.
//!
//! A path expression names a value in the object graph: `/`-separated parts
//! traversed from a root name, with `|`-separated alternates tried left to
//! right and `${...}` interpolation inside parts. This is the default
//! dialect.

pub mod ast;
pub mod parser;
pub mod resolver;
mod walker;

pub use ast::{AlternateExpression, PathExpression, PathPart};
pub use parser::parse;
pub use resolver::{ResolutionTarget, ValueResolutionChain, ValueResolver};

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{EvaluationScope, ExpressionContext, ExpressionEvaluator};
use crate::errors::Result;
use crate::model::Value;

/// Parsed expressions retained before the cache is cleared wholesale.
const MAX_CACHED_EXPRESSIONS: usize = 512;

/// Evaluator for the `path:` dialect.
///
/// Keeps a bounded cache of parsed expressions; templates evaluate the same
/// attribute text once per repeat iteration, so parses repeat heavily.
pub struct PathExpressionEvaluator {
    chain: Arc<ValueResolutionChain>,
    cache: Mutex<FxHashMap<String, Arc<PathExpression>>>,
}

impl PathExpressionEvaluator {
    /// Creates an evaluator resolving values through the given chain.
    pub fn new(chain: Arc<ValueResolutionChain>) -> Self {
        Self {
            chain,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    fn parse_cached(&self, text: &str) -> Result<Arc<PathExpression>> {
        if let Some(parsed) = self.cache.lock().get(text) {
            return Ok(Arc::clone(parsed));
        }
        let parsed = Arc::new(parse(text)?);
        let mut cache = self.cache.lock();
        if cache.len() >= MAX_CACHED_EXPRESSIONS {
            cache.clear();
        }
        cache.insert(text.to_owned(), Arc::clone(&parsed));
        Ok(parsed)
    }
}

#[async_trait]
impl ExpressionEvaluator for PathExpressionEvaluator {
    async fn evaluate(
        &self,
        expression: &str,
        context: &ExpressionContext,
        scope: &EvaluationScope<'_>,
    ) -> Result<Value> {
        let parsed = self.parse_cached(expression)?;
        walker::evaluate_path(&self.chain, &parsed, expression, context, scope).await
    }
}
