//! The open value model threaded through expression evaluation.
//!
//! Host applications hand the engine an arbitrary object graph; [`Value`] is
//! the uniform wrapper the chain-of-responsibility resolvers traverse. Plain
//! data maps straight onto the primitive variants, richer hosts plug in via
//! [`TalesValueSource`] (self-describing lookup) or the blanket
//! [`Reflective`] impl for any `Serialize` type.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::metal::MacroDefinition;

/// A value in the template object graph.
#[derive(Debug, Clone)]
pub enum Value {
    /// The null value (`nothing` builtin); removes content/attributes.
    Nothing,
    /// The abort-action token (`default` builtin); leaves markup untouched.
    Default,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered sequence, iterable by `tal:repeat`.
    Sequence(Vec<Value>),
    /// An order-preserving string-keyed map.
    Map(IndexMap<String, Value>),
    /// A shared mutable property bag.
    Bag(PropertyBag),
    /// A self-describing host object answering named lookups itself.
    Object(Arc<dyn TalesValueSource>),
    /// An opaque host object introspected via its serde representation.
    Reflective(Arc<dyn Reflective>),
    /// A template macro, produced by the `template/macros/<name>` builtin.
    Macro(Arc<MacroDefinition>),
}

impl Value {
    /// Wraps a self-describing host object.
    pub fn object(source: impl TalesValueSource + 'static) -> Self {
        Value::Object(Arc::new(source))
    }

    /// Wraps a host object for serde-based member lookup.
    pub fn reflective(object: impl Reflective + 'static) -> Self {
        Value::Reflective(Arc::new(object))
    }

    /// True for the abort-action token.
    pub fn is_default(&self) -> bool {
        matches!(self, Value::Default)
    }

    /// True for the null value.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }

    /// Boolean coercion used by `tal:condition`, `tal:omit-tag` and `not:`.
    ///
    /// `Nothing`, `false`, numeric zero, the empty string and the empty
    /// sequence are false; everything else, including `Default`, is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nothing => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Sequence(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// The items to iterate for `tal:repeat`, if this value is iterable.
    ///
    /// Sequences yield their items; maps yield their values in insertion
    /// order. Other values are not iterable.
    pub fn iter_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Sequence(items) => Some(items.clone()),
            Value::Map(map) => Some(map.values().cloned().collect()),
            _ => None,
        }
    }

    /// A short description of the value for traversal-failure messages.
    pub fn describe(&self) -> String {
        match self {
            Value::Nothing => "<null>".to_owned(),
            Value::Default => "<default>".to_owned(),
            Value::Bool(b) => format!("boolean {b}"),
            Value::Int(i) => format!("number {i}"),
            Value::Float(f) => format!("number {f}"),
            Value::String(s) => format!("string {s:?}"),
            Value::Sequence(items) => format!("sequence of {} items", items.len()),
            Value::Map(map) => format!("map of {} entries", map.len()),
            Value::Bag(bag) => format!("property bag of {} entries", bag.len()),
            Value::Object(object) => object.description(),
            Value::Reflective(object) => format!("<object {}>", object.type_name()),
            Value::Macro(definition) => format!("<macro {}>", definition.name()),
        }
    }
}

impl fmt::Display for Value {
    /// String coercion used by `tal:content`/`tal:replace`, `tal:attributes`
    /// and `string:` interpolation. `Nothing` and `Default` render empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nothing | Value::Default => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::Sequence(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&rendered.join(", "))
            }
            other => f.write_str(&other.describe()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nothing, Value::Nothing) => true,
            (Value::Default, Value::Default) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Bag(a), Value::Bag(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Reflective(a), Value::Reflective(b)) => Arc::ptr_eq(a, b),
            (Value::Macro(a), Value::Macro(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nothing,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// The outcome of asking a resolver or host object for a named member.
///
/// "Not found" is ordinary control flow in the resolution chain, never an
/// error; only exhausting the whole chain raises one.
#[derive(Debug, Clone, PartialEq)]
pub enum GetValueResult {
    /// The member exists and produced this value.
    Found(Value),
    /// The member does not exist here; the next link should try.
    NotFound,
}

impl GetValueResult {
    /// Wraps a value that was found.
    pub fn found(value: impl Into<Value>) -> Self {
        GetValueResult::Found(value.into())
    }

    /// Converts to an `Option`, discarding the distinction for callers that
    /// only care about the value.
    pub fn into_option(self) -> Option<Value> {
        match self {
            GetValueResult::Found(value) => Some(value),
            GetValueResult::NotFound => None,
        }
    }
}

/// A host object that answers named TALES lookups itself.
///
/// Implement this to take full control of member resolution; the
/// self-describing link of the resolution chain consults it before any
/// generic strategy runs.
#[async_trait::async_trait]
pub trait TalesValueSource: fmt::Debug + Send + Sync {
    /// Looks up a named member of this object.
    async fn try_get_value(&self, name: &str) -> GetValueResult;

    /// A short description used in traversal-failure messages.
    fn description(&self) -> String {
        "<object>".to_owned()
    }
}

/// A host object whose members are read from its serde representation.
///
/// A blanket impl covers every `Serialize + Debug + Send + Sync` type, so any
/// ordinary data struct participates in path traversal without further
/// ceremony. The reflection link serializes the object once per lookup and
/// indexes the resulting JSON snapshot.
pub trait Reflective: fmt::Debug + Send + Sync {
    /// The serde snapshot whose members are visible to path traversal.
    fn reflect(&self) -> serde_json::Value;

    /// The host type's name, for error messages.
    fn type_name(&self) -> &'static str;
}

impl<T> Reflective for T
where
    T: serde::Serialize + fmt::Debug + Send + Sync,
{
    fn reflect(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A shared, mutable string-keyed property bag.
///
/// Clones share storage, so a bag bound into a template variable can be
/// updated by the host mid-render and later lookups observe the change.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    values: Arc<RwLock<FxHashMap<String, Value>>>,
}

impl PropertyBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a named property.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.write().insert(name.into(), value.into());
    }

    /// Reads a named property.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    /// The number of properties in the bag.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Whether two bags share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion_is_deep() {
        let value = Value::from(json!({
            "name": "zope",
            "tags": ["a", "b"],
            "nested": { "n": 3 }
        }));

        let Value::Map(map) = value else {
            panic!("expected a map")
        };
        assert_eq!(map.get("name"), Some(&Value::String("zope".into())));
        assert_eq!(
            map.get("tags"),
            Some(&Value::Sequence(vec!["a".into(), "b".into()]))
        );
        let Some(Value::Map(nested)) = map.get("nested") else {
            panic!("expected a nested map")
        };
        assert_eq!(nested.get("n"), Some(&Value::Int(3)));
    }

    #[test]
    fn truthiness_follows_template_rules() {
        assert!(!Value::Nothing.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(!Value::Sequence(Vec::new()).is_truthy());

        assert!(Value::Default.is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::String("x".into()).is_truthy());
    }

    #[test]
    fn display_coercion_renders_nothing_as_empty() {
        assert_eq!(Value::Nothing.to_string(), "");
        assert_eq!(Value::Default.to_string(), "");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(
            Value::Sequence(vec!["a".into(), "b".into()]).to_string(),
            "a, b"
        );
    }

    #[test]
    fn property_bag_clones_share_storage() {
        let bag = PropertyBag::new();
        let alias = bag.clone();
        bag.set("k", 1i64);
        assert_eq!(alias.get("k"), Some(Value::Int(1)));
        assert!(bag.ptr_eq(&alias));
    }
}
