//! The rendering engine: wires the dialect registry, the resolution chain
//! and the processing pipeline together behind one entry point.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::RenderingConfig;
use crate::dom::{to_markup_string, Document, DocumentProvider};
use crate::errors::{Result, ZptError};
use crate::expressions::path::{PathExpressionEvaluator, ValueResolutionChain, ValueResolver};
use crate::expressions::{
    EvaluatorRegistry, ExpressionContext, ExpressionEvaluator, NotExpressionEvaluator,
    StringExpressionEvaluator,
};
use crate::metal::{discover_macros, MacroUsageProcessor};
use crate::model::Value;
use crate::rendering::annotation::SourceAnnotationProcessor;
use crate::rendering::{
    CleanupProcessor, CompositeProcessor, ContextProcessor, DocumentModifier, RenderScope,
};
use crate::tal::TalProcessor;

/// The template rendering engine.
///
/// An engine is built once and shared: rendering takes `&self`, so one
/// engine may serve many concurrent renders over distinct documents.
///
/// ```
/// use tokio_util::sync::CancellationToken;
/// use zpt::{Attribute, Document, RenderingConfig, Value, ZptEngine};
///
/// let mut doc = Document::new("greeting.html", "p");
/// doc.set_attribute(
///     doc.root(),
///     Attribute::namespaced("tal", "content", "here/name"),
/// );
///
/// let engine = ZptEngine::new();
/// let model = Value::from(serde_json::json!({ "name": "world" }));
/// let markup = tokio::runtime::Runtime::new()
///     .unwrap()
///     .block_on(engine.render_to_string(
///         &mut doc,
///         model,
///         &RenderingConfig::default(),
///         CancellationToken::new(),
///     ))
///     .unwrap();
/// assert_eq!(markup, "<p>world</p>");
/// ```
pub struct ZptEngine {
    registry: EvaluatorRegistry,
    chain: ValueResolutionChain,
    provider: Option<Arc<dyn DocumentProvider>>,
}

impl ZptEngine {
    /// Creates an engine with the standard resolution chain and the three
    /// built-in dialects (`path`, `string`, `not`).
    pub fn new() -> Self {
        let chain = ValueResolutionChain::standard();
        let mut engine = Self {
            registry: EvaluatorRegistry::new(),
            chain,
            provider: None,
        };
        engine.refresh_path_evaluator();
        engine
            .registry
            .register("string", Arc::new(StringExpressionEvaluator::new()));
        engine
            .registry
            .register("not", Arc::new(NotExpressionEvaluator::new()));
        engine
    }

    fn refresh_path_evaluator(&mut self) {
        self.registry.register(
            "path",
            Arc::new(PathExpressionEvaluator::new(Arc::new(self.chain.clone()))),
        );
    }

    /// Registers (or replaces) an expression dialect.
    pub fn register_evaluator(
        &mut self,
        prefix: impl Into<String>,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) {
        self.registry.register(prefix, evaluator);
    }

    /// Inserts a host-supplied resolution link immediately before the
    /// reflection fallback of the path dialect's chain.
    pub fn insert_resolver_before_reflection(&mut self, resolver: Arc<dyn ValueResolver>) {
        self.chain.insert_before_reflection(resolver);
        self.refresh_path_evaluator();
    }

    /// Registers a document backend for the byte-stream entry point.
    pub fn with_document_provider(mut self, provider: Arc<dyn DocumentProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Renders a document tree in place against a model object.
    ///
    /// Any internal failure other than cancellation surfaces wrapped in
    /// [`ZptError::Rendering`]; [`ZptError::Cancelled`] passes through
    /// unwrapped.
    pub async fn render_document(
        &self,
        document: &mut Document,
        model: Value,
        config: &RenderingConfig,
        cancel: CancellationToken,
    ) -> Result<()> {
        document.set_macros(discover_macros(document));

        let mut processors: Vec<Arc<dyn ContextProcessor>> =
            vec![Arc::new(MacroUsageProcessor::new())];
        if config.include_source_annotation {
            processors.push(Arc::new(SourceAnnotationProcessor::new()));
        }
        processors.push(Arc::new(TalProcessor::new()));
        let pipeline = CompositeProcessor::new(processors);

        let scope = RenderScope {
            config,
            registry: &self.registry,
            cancel: &cancel,
        };
        let root_context = ExpressionContext::root(document.root(), model.clone());
        DocumentModifier::new(&pipeline)
            .modify_document(document, root_context, &scope)
            .await
            .map_err(ZptError::into_rendering)?;

        // Substituted subtrees end their walk early, so template attributes
        // are stripped in a second full pass over the finished tree.
        let cleanup = CleanupProcessor::new();
        let cleanup_context = ExpressionContext::root(document.root(), model);
        DocumentModifier::new(&cleanup)
            .modify_document(document, cleanup_context, &scope)
            .await
            .map_err(ZptError::into_rendering)
    }

    /// Renders a document tree and serializes it with the built-in writer.
    pub async fn render_to_string(
        &self,
        document: &mut Document,
        model: Value,
        config: &RenderingConfig,
        cancel: CancellationToken,
    ) -> Result<String> {
        self.render_document(document, model, config, cancel).await?;
        Ok(to_markup_string(document))
    }

    /// Renders serialized markup through the registered document backend.
    ///
    /// Backend read/write failures surface wrapped in [`ZptError::Rendering`]
    /// like any other render-time failure. A missing provider is a
    /// configuration error and surfaces unwrapped as [`ZptError::Document`].
    pub async fn render(
        &self,
        input: &[u8],
        source_name: &str,
        model: Value,
        config: &RenderingConfig,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            ZptError::Document("no document provider is registered with this engine".to_owned())
        })?;
        let mut document = provider
            .read_document(input, source_name, config)
            .await
            .map_err(ZptError::into_rendering)?;
        self.render_document(&mut document, model, config, cancel.clone())
            .await?;
        provider
            .write_document(&document, config)
            .await
            .map_err(ZptError::into_rendering)
    }
}

impl Default for ZptEngine {
    fn default() -> Self {
        Self::new()
    }
}
