//! Chain-of-responsibility resolution of a single path part against the
//! current traversal object.
//!
//! Each link answers [`GetValueResult::NotFound`] to pass the question along;
//! only the terminal link raises an error. "Not found" is ordinary control
//! flow here, which is what lets the chain try several strategies in a fixed
//! precedence order.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::trace;

use super::super::{EvaluationScope, ExpressionContext};
use crate::errors::{Result, ZptError};
use crate::model::{GetValueResult, Value};

/// What a path part is being resolved against.
#[derive(Clone, Copy)]
pub enum ResolutionTarget<'a> {
    /// The root of a traversal: the expression context itself.
    Context(&'a ExpressionContext),
    /// A value produced by an earlier traversal step.
    Value(&'a Value),
}

impl ResolutionTarget<'_> {
    /// A short description of the target for traversal-failure messages.
    pub fn describe(&self) -> String {
        match self {
            ResolutionTarget::Context(_) => "the expression context".to_owned(),
            ResolutionTarget::Value(value) => value.describe(),
        }
    }
}

/// One link of the resolution chain.
#[async_trait]
pub trait ValueResolver: Send + Sync {
    /// Attempts to resolve a named member of the target.
    async fn try_resolve(
        &self,
        target: ResolutionTarget<'_>,
        part: &str,
        scope: &EvaluationScope<'_>,
    ) -> Result<GetValueResult>;
}

/// The ordered resolution chain.
///
/// The standard chain has seven links; hosts may insert custom links
/// immediately before the reflection fallback via
/// [`ValueResolutionChain::insert_before_reflection`].
#[derive(Clone)]
pub struct ValueResolutionChain {
    links: Vec<Arc<dyn ValueResolver>>,
    reflection_index: usize,
}

impl ValueResolutionChain {
    /// Builds the standard chain, in precedence order: context adapter,
    /// self-describing objects, string-keyed maps, integer-keyed sequences,
    /// property bags, serde reflection, terminal failure.
    pub fn standard() -> Self {
        let links: Vec<Arc<dyn ValueResolver>> = vec![
            Arc::new(ContextResolver),
            Arc::new(SelfDescribingResolver),
            Arc::new(StringKeyedResolver),
            Arc::new(IntegerKeyedResolver),
            Arc::new(PropertyBagResolver),
            Arc::new(ReflectionResolver),
            Arc::new(FailureResolver),
        ];
        let reflection_index = links.len() - 2;
        Self {
            links,
            reflection_index,
        }
    }

    /// Inserts a host-supplied link immediately before the reflection
    /// fallback, after every built-in strategy with specific knowledge.
    pub fn insert_before_reflection(&mut self, resolver: Arc<dyn ValueResolver>) {
        self.links.insert(self.reflection_index, resolver);
        self.reflection_index += 1;
    }

    /// Resolves one part against a target by consulting the links in order.
    pub async fn resolve(
        &self,
        target: ResolutionTarget<'_>,
        part: &str,
        scope: &EvaluationScope<'_>,
    ) -> Result<Value> {
        for link in &self.links {
            if let GetValueResult::Found(value) = link.try_resolve(target, part, scope).await? {
                return Ok(value);
            }
        }
        // Unreachable with the terminal link in place; kept for safety.
        Err(ZptError::Evaluation {
            part: part.to_owned(),
            object: target.describe(),
        })
    }
}

impl fmt::Debug for ValueResolutionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueResolutionChain")
            .field("links", &self.links.len())
            .finish()
    }
}

/// Resolves root names against the expression context: scope variables
/// first, then builtins.
struct ContextResolver;

#[async_trait]
impl ValueResolver for ContextResolver {
    async fn try_resolve(
        &self,
        target: ResolutionTarget<'_>,
        part: &str,
        scope: &EvaluationScope<'_>,
    ) -> Result<GetValueResult> {
        let ResolutionTarget::Context(context) = target else {
            return Ok(GetValueResult::NotFound);
        };
        match context.resolve_name(part, scope) {
            Some(value) => Ok(GetValueResult::Found(value)),
            None => Ok(GetValueResult::NotFound),
        }
    }
}

/// Lets a self-describing host object answer the lookup itself.
struct SelfDescribingResolver;

#[async_trait]
impl ValueResolver for SelfDescribingResolver {
    async fn try_resolve(
        &self,
        target: ResolutionTarget<'_>,
        part: &str,
        _scope: &EvaluationScope<'_>,
    ) -> Result<GetValueResult> {
        let ResolutionTarget::Value(Value::Object(object)) = target else {
            return Ok(GetValueResult::NotFound);
        };
        Ok(object.try_get_value(part).await)
    }
}

/// Indexes string-keyed maps.
struct StringKeyedResolver;

#[async_trait]
impl ValueResolver for StringKeyedResolver {
    async fn try_resolve(
        &self,
        target: ResolutionTarget<'_>,
        part: &str,
        _scope: &EvaluationScope<'_>,
    ) -> Result<GetValueResult> {
        let ResolutionTarget::Value(Value::Map(map)) = target else {
            return Ok(GetValueResult::NotFound);
        };
        match map.get(part) {
            Some(value) => Ok(GetValueResult::Found(value.clone())),
            None => Ok(GetValueResult::NotFound),
        }
    }
}

/// Indexes sequences by a part that parses as a non-negative integer.
struct IntegerKeyedResolver;

#[async_trait]
impl ValueResolver for IntegerKeyedResolver {
    async fn try_resolve(
        &self,
        target: ResolutionTarget<'_>,
        part: &str,
        _scope: &EvaluationScope<'_>,
    ) -> Result<GetValueResult> {
        let ResolutionTarget::Value(Value::Sequence(items)) = target else {
            return Ok(GetValueResult::NotFound);
        };
        let Ok(index) = part.parse::<usize>() else {
            return Ok(GetValueResult::NotFound);
        };
        match items.get(index) {
            Some(value) => Ok(GetValueResult::Found(value.clone())),
            None => Ok(GetValueResult::NotFound),
        }
    }
}

/// Reads shared property bags.
struct PropertyBagResolver;

#[async_trait]
impl ValueResolver for PropertyBagResolver {
    async fn try_resolve(
        &self,
        target: ResolutionTarget<'_>,
        part: &str,
        _scope: &EvaluationScope<'_>,
    ) -> Result<GetValueResult> {
        let ResolutionTarget::Value(Value::Bag(bag)) = target else {
            return Ok(GetValueResult::NotFound);
        };
        match bag.get(part) {
            Some(value) => Ok(GetValueResult::Found(value)),
            None => Ok(GetValueResult::NotFound),
        }
    }
}

/// The introspection fallback: reads named members from the serde snapshot
/// of an otherwise opaque host object.
struct ReflectionResolver;

#[async_trait]
impl ValueResolver for ReflectionResolver {
    async fn try_resolve(
        &self,
        target: ResolutionTarget<'_>,
        part: &str,
        _scope: &EvaluationScope<'_>,
    ) -> Result<GetValueResult> {
        let ResolutionTarget::Value(Value::Reflective(object)) = target else {
            return Ok(GetValueResult::NotFound);
        };
        let snapshot = object.reflect();
        trace!(
            "reflection lookup of `{part}` on {}",
            object.type_name()
        );
        match snapshot.get(part) {
            Some(member) => Ok(GetValueResult::Found(Value::from(member.clone()))),
            None => Ok(GetValueResult::NotFound),
        }
    }
}

/// The terminal link: every strategy has declined, so the part cannot be
/// traversed.
struct FailureResolver;

#[async_trait]
impl ValueResolver for FailureResolver {
    async fn try_resolve(
        &self,
        target: ResolutionTarget<'_>,
        part: &str,
        _scope: &EvaluationScope<'_>,
    ) -> Result<GetValueResult> {
        Err(ZptError::Evaluation {
            part: part.to_owned(),
            object: target.describe(),
        })
    }
}
