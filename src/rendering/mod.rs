//! The document-modification pass: a depth-first walk pairing each node with
//! an expression context and handing the pair to a processor.
//!
//! Processors mutate the document as they go, so the walk takes its child
//! snapshot after the processor has run and honors the processor's verdict:
//! stop here, descend naturally, or descend into replacement contexts
//! instead of the node's own children.

pub mod annotation;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace};
use tokio_util::sync::CancellationToken;

use crate::config::RenderingConfig;
use crate::dom::{Document, NodeKind, METAL_NAMESPACE, TAL_NAMESPACE};
use crate::errors::{Result, ZptError};
use crate::expressions::{EvaluatorRegistry, ExpressionContext};

/// Shared, read-only state for a whole rendering pass.
///
/// Unlike [`crate::expressions::EvaluationScope`] this carries no document
/// borrow; processors hold the document mutably and reborrow it immutably
/// for the duration of each expression evaluation.
pub struct RenderScope<'a> {
    /// The active rendering configuration.
    pub config: &'a RenderingConfig,
    /// The expression-dialect registry.
    pub registry: &'a EvaluatorRegistry,
    /// Cooperative cancellation for the whole render.
    pub cancel: &'a CancellationToken,
}

/// A processor's verdict on one node.
#[derive(Debug, Default)]
pub struct ProcessingResult {
    /// Do not descend into this node's children.
    pub skip_children: bool,
    /// Contexts to descend into *instead of* this node's natural children.
    pub additional_contexts: Vec<ExpressionContext>,
}

impl ProcessingResult {
    /// Continue the walk into the node's natural children.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Stop the walk at this node.
    pub fn without_children() -> Self {
        Self {
            skip_children: true,
            additional_contexts: Vec::new(),
        }
    }

    /// Descend into the given contexts instead of the natural children.
    pub fn with_additional_contexts(contexts: Vec<ExpressionContext>) -> Self {
        Self {
            skip_children: true,
            additional_contexts: contexts,
        }
    }
}

/// Whether a processor handled a failure raised beneath a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorHandlingResult {
    /// The failure was absorbed; the walk continues past this subtree.
    Handled,
    /// Not this processor's business; the failure keeps propagating.
    Unhandled,
}

/// A participant in the document-modification pass.
#[async_trait]
pub trait ContextProcessor: Send + Sync {
    /// Processes one node/context pair, possibly mutating the document.
    async fn process_context(
        &self,
        document: &mut Document,
        context: &mut ExpressionContext,
        scope: &RenderScope<'_>,
    ) -> Result<ProcessingResult>;

    /// Offers this processor a failure raised while processing the node or
    /// anything beneath it.
    async fn handle_error(
        &self,
        _document: &mut Document,
        _context: &mut ExpressionContext,
        _error: &ZptError,
        _scope: &RenderScope<'_>,
    ) -> Result<ErrorHandlingResult> {
        Ok(ErrorHandlingResult::Unhandled)
    }
}

/// The depth-first walk driver.
///
/// Recursive rather than worklist-based so that a failure raised anywhere in
/// a subtree unwinds through every enclosing node, giving each one's
/// processor a chance to handle it (`tal:on-error`).
pub struct DocumentModifier<'a> {
    processor: &'a dyn ContextProcessor,
}

impl<'a> DocumentModifier<'a> {
    /// Creates a driver for one processor (usually a [`CompositeProcessor`]).
    pub fn new(processor: &'a dyn ContextProcessor) -> Self {
        Self { processor }
    }

    /// Walks the document from the given root context.
    pub async fn modify_document(
        &self,
        document: &mut Document,
        root_context: ExpressionContext,
        scope: &RenderScope<'_>,
    ) -> Result<()> {
        self.visit(document, root_context, scope).await
    }

    fn visit<'s>(
        &'s self,
        document: &'s mut Document,
        mut context: ExpressionContext,
        scope: &'s RenderScope<'s>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 's>> {
        Box::pin(async move {
            if scope.cancel.is_cancelled() {
                return Err(ZptError::Cancelled);
            }
            trace!(
                "processing {} of {}",
                document.describe_node(context.node),
                document.name()
            );

            let mut failure: Option<ZptError> = None;
            match self
                .processor
                .process_context(document, &mut context, scope)
                .await
            {
                Ok(result) => {
                    let child_contexts = if !result.additional_contexts.is_empty() {
                        result.additional_contexts
                    } else if result.skip_children {
                        Vec::new()
                    } else {
                        document
                            .children(context.node)
                            .to_vec()
                            .into_iter()
                            .map(|child| context.create_child(child))
                            .collect()
                    };
                    for child in child_contexts {
                        if let Err(error) = self.visit(document, child, scope).await {
                            failure = Some(error);
                            break;
                        }
                    }
                }
                Err(error) => failure = Some(error),
            }

            let Some(error) = failure else {
                return Ok(());
            };
            if error.is_cancelled() {
                return Err(error);
            }
            match self
                .processor
                .handle_error(document, &mut context, &error, scope)
                .await?
            {
                ErrorHandlingResult::Handled => {
                    debug!(
                        "error absorbed at {}: {error}",
                        document.describe_node(context.node)
                    );
                    Ok(())
                }
                ErrorHandlingResult::Unhandled => Err(error),
            }
        })
    }
}

/// Runs several processors in a fixed order on each node.
///
/// The first processor whose verdict alters the walk (skipped children or
/// replacement contexts) short-circuits the rest for that node; a node whose
/// subtree is being replaced must not also be processed as ordinary content.
pub struct CompositeProcessor {
    processors: Vec<Arc<dyn ContextProcessor>>,
}

impl CompositeProcessor {
    /// Creates a composite over the given processors, in processing order.
    pub fn new(processors: Vec<Arc<dyn ContextProcessor>>) -> Self {
        Self { processors }
    }
}

#[async_trait]
impl ContextProcessor for CompositeProcessor {
    async fn process_context(
        &self,
        document: &mut Document,
        context: &mut ExpressionContext,
        scope: &RenderScope<'_>,
    ) -> Result<ProcessingResult> {
        for processor in &self.processors {
            let result = processor.process_context(document, context, scope).await?;
            if result.skip_children || !result.additional_contexts.is_empty() {
                return Ok(result);
            }
        }
        Ok(ProcessingResult::noop())
    }

    async fn handle_error(
        &self,
        document: &mut Document,
        context: &mut ExpressionContext,
        error: &ZptError,
        scope: &RenderScope<'_>,
    ) -> Result<ErrorHandlingResult> {
        for processor in &self.processors {
            if processor.handle_error(document, context, error, scope).await?
                == ErrorHandlingResult::Handled
            {
                return Ok(ErrorHandlingResult::Handled);
            }
        }
        Ok(ErrorHandlingResult::Unhandled)
    }
}

/// The final pass over each node: strips template-language attributes from
/// the output and omits elements that exist purely as template scaffolding
/// (`tal:block`-style elements named in a template namespace).
#[derive(Debug, Default)]
pub struct CleanupProcessor;

impl CleanupProcessor {
    /// Creates the processor.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContextProcessor for CleanupProcessor {
    async fn process_context(
        &self,
        document: &mut Document,
        context: &mut ExpressionContext,
        _scope: &RenderScope<'_>,
    ) -> Result<ProcessingResult> {
        let node = context.node;
        if !matches!(document.node(node).kind, NodeKind::Element { .. }) {
            return Ok(ProcessingResult::noop());
        }

        document.node_mut(node).attributes.retain(|attribute| {
            !matches!(
                attribute.namespace.as_deref(),
                Some(TAL_NAMESPACE) | Some(METAL_NAMESPACE)
            )
        });

        let scaffolding = matches!(
            document.node(node).tag_namespace(),
            Some(TAL_NAMESPACE) | Some(METAL_NAMESPACE)
        );
        if scaffolding {
            let lifted = document.omit_node(node);
            let contexts = lifted
                .into_iter()
                .map(|child| context.create_child(child))
                .collect();
            return Ok(ProcessingResult::with_additional_contexts(contexts));
        }
        Ok(ProcessingResult::noop())
    }
}
