//! The expression context: one node of the rendering tree walk, together
//! with everything expressions evaluated at that node may see.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::EvaluationScope;
use crate::dom::NodeId;
use crate::model::{GetValueResult, TalesValueSource, Value};

/// The evaluation context for one document node.
///
/// Local bindings are snapshot-cloned into each child context, so a sibling
/// subtree never observes another sibling's `tal:define` bindings. Global
/// bindings live behind a shared lock and are visible everywhere from the
/// point of definition onward, in document order.
#[derive(Debug, Clone)]
pub struct ExpressionContext {
    /// The document node this context describes.
    pub node: NodeId,
    /// The model object the render was invoked with (the `here` builtin).
    pub model: Value,
    /// The error being handled by `tal:on-error`, if any.
    pub error: Option<Value>,
    /// Keys of macros currently being expanded on this branch of the walk,
    /// outermost first. Used to fail fast on expansion cycles.
    pub expansion_stack: Vec<String>,
    /// Whether this is the root context of the render.
    pub is_root: bool,
    locals: FxHashMap<String, Value>,
    globals: Arc<RwLock<FxHashMap<String, Value>>>,
    repetitions: FxHashMap<String, Value>,
}

impl ExpressionContext {
    /// Creates the root context for a render.
    pub fn root(node: NodeId, model: Value) -> Self {
        Self {
            node,
            model,
            error: None,
            expansion_stack: Vec::new(),
            is_root: true,
            locals: FxHashMap::default(),
            globals: Arc::new(RwLock::new(FxHashMap::default())),
            repetitions: FxHashMap::default(),
        }
    }

    /// Creates the child context for one child node.
    ///
    /// Locals, repetitions and the expansion stack are snapshot-cloned;
    /// globals stay shared with the whole render.
    pub fn create_child(&self, node: NodeId) -> Self {
        Self {
            node,
            model: self.model.clone(),
            error: self.error.clone(),
            expansion_stack: self.expansion_stack.clone(),
            is_root: false,
            locals: self.locals.clone(),
            globals: Arc::clone(&self.globals),
            repetitions: self.repetitions.clone(),
        }
    }

    /// Binds a local variable, visible to this context and its descendants.
    pub fn define_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    /// Binds a global variable, visible to every context from here onward.
    pub fn define_global(&self, name: impl Into<String>, value: Value) {
        self.globals.write().insert(name.into(), value);
    }

    /// Records the loop variable for an active `tal:repeat` iteration.
    pub fn set_repetition(&mut self, name: impl Into<String>, info: Value) {
        self.repetitions.insert(name.into(), info);
    }

    /// Looks up a scope variable: locals shadow globals.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.locals.get(name) {
            return Some(value.clone());
        }
        self.globals.read().get(name).cloned()
    }

    /// Resolves a root path name: scope variables shadow builtins.
    pub fn resolve_name(&self, name: &str, scope: &EvaluationScope<'_>) -> Option<Value> {
        self.lookup(name)
            .or_else(|| self.builtin_value(name, Some(scope)))
    }

    /// Resolves a builtin root name.
    ///
    /// `attrs`, `template` and `options` need the live evaluation scope; when
    /// it is unavailable (a context captured as a plain value) they resolve
    /// to nothing at all.
    pub fn builtin_value(&self, name: &str, scope: Option<&EvaluationScope<'_>>) -> Option<Value> {
        match name {
            "here" => Some(self.model.clone()),
            "nothing" => Some(Value::Nothing),
            "default" => Some(Value::Default),
            "error" => self.error.clone(),
            "repeat" => {
                let map: IndexMap<String, Value> = self
                    .repetitions
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(Value::Map(map))
            }
            "options" => scope.map(|s| Value::Map(s.config.keyword_options.clone())),
            "attrs" => scope.map(|s| {
                let map: IndexMap<String, Value> = s
                    .document
                    .node(self.node)
                    .attributes
                    .iter()
                    .map(|a| (a.qualified_name(), Value::String(a.value.clone())))
                    .collect();
                Value::Map(map)
            }),
            "template" => scope.map(|s| {
                let macros: IndexMap<String, Value> = s
                    .document
                    .macros()
                    .iter()
                    .map(|(name, definition)| {
                        (name.clone(), Value::Macro(Arc::clone(definition)))
                    })
                    .collect();
                let mut template = IndexMap::new();
                template.insert("name".to_owned(), Value::String(s.document.name().to_owned()));
                template.insert("macros".to_owned(), Value::Map(macros));
                Value::Map(template)
            }),
            _ => None,
        }
    }
}

/// A context captured as a plain value: the result of evaluating an empty
/// path expression.
///
/// The captured context outlives the document borrow, so only scope
/// variables and document-independent builtins remain resolvable through it.
#[derive(Debug, Clone)]
pub struct ContextValue {
    context: ExpressionContext,
}

impl ContextValue {
    /// Captures a context.
    pub fn new(context: ExpressionContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl TalesValueSource for ContextValue {
    async fn try_get_value(&self, name: &str) -> GetValueResult {
        match self
            .context
            .lookup(name)
            .or_else(|| self.context.builtin_value(name, None))
        {
            Some(value) => GetValueResult::Found(value),
            None => GetValueResult::NotFound,
        }
    }

    fn description(&self) -> String {
        "<expression context>".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        crate::dom::Document::new("t.html", "div").root()
    }

    #[test]
    fn child_contexts_snapshot_locals() {
        let mut parent = ExpressionContext::root(node(), Value::Nothing);
        parent.define_local("a", Value::Int(1));

        let mut child = parent.create_child(parent.node);
        child.define_local("a", Value::Int(2));
        child.define_local("b", Value::Int(3));

        assert_eq!(parent.lookup("a"), Some(Value::Int(1)));
        assert_eq!(parent.lookup("b"), None);
        assert_eq!(child.lookup("a"), Some(Value::Int(2)));
    }

    #[test]
    fn globals_are_shared_across_the_tree() {
        let parent = ExpressionContext::root(node(), Value::Nothing);
        let child = parent.create_child(parent.node);
        child.define_global("g", Value::String("x".into()));

        assert_eq!(parent.lookup("g"), Some(Value::String("x".into())));
    }

    #[test]
    fn locals_shadow_globals_and_builtins() {
        let mut context = ExpressionContext::root(node(), Value::Int(9));
        assert_eq!(context.builtin_value("here", None), Some(Value::Int(9)));

        context.define_local("here", Value::Int(1));
        assert_eq!(context.lookup("here"), Some(Value::Int(1)));
    }

    #[test]
    fn error_builtin_only_resolves_while_handling() {
        let mut context = ExpressionContext::root(node(), Value::Nothing);
        assert_eq!(context.builtin_value("error", None), None);

        context.error = Some(Value::String("boom".into()));
        assert_eq!(
            context.builtin_value("error", None),
            Some(Value::String("boom".into()))
        );
    }
}
