//! Source annotation: comments identifying where output markup came from.

use async_trait::async_trait;

use super::{ContextProcessor, ProcessingResult, RenderScope};
use crate::dom::Document;
use crate::errors::Result;
use crate::expressions::ExpressionContext;

const DIVIDER: &str = "==============================================================================";

/// Inserts a comment before the document root and before every element
/// imported from another document, naming the source and line.
///
/// Only active when [`crate::config::RenderingConfig::include_source_annotation`]
/// is set; the engine leaves this processor out of the pipeline otherwise.
#[derive(Debug, Default)]
pub struct SourceAnnotationProcessor;

impl SourceAnnotationProcessor {
    /// Creates the processor.
    pub fn new() -> Self {
        Self
    }

    fn annotation(document: &Document, context: &ExpressionContext, scope: &RenderScope<'_>) -> String {
        let node = document.node(context.node);
        let mut source = node.source.clone();
        if let Some(base) = &scope.config.source_annotation_base_path {
            if let Some(relative) = source.strip_prefix(base.as_str()) {
                source = relative.trim_start_matches(['/', '\\']).to_owned();
            }
        }
        let location = match node.line {
            Some(line) => format!("{source} (line {line})"),
            None => source,
        };
        format!("\n{DIVIDER}\n{location}\n{DIVIDER}\n")
    }
}

#[async_trait]
impl ContextProcessor for SourceAnnotationProcessor {
    async fn process_context(
        &self,
        document: &mut Document,
        context: &mut ExpressionContext,
        scope: &RenderScope<'_>,
    ) -> Result<ProcessingResult> {
        let node = document.node(context.node);
        if !node.is_element() {
            return Ok(ProcessingResult::noop());
        }
        // Imported subtrees are annotated once, at their boundary element.
        let import_boundary = node.is_imported
            && match document.parent(context.node) {
                Some(parent) => !document.node(parent).is_imported,
                None => true,
            };
        if context.is_root || import_boundary {
            let comment = Self::annotation(document, context, scope);
            let annotation = document.new_comment(comment);
            if context.is_root {
                document.prepend_child(context.node, annotation);
            } else {
                document.insert_before(context.node, annotation);
            }
        }
        Ok(ProcessingResult::noop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderingConfig;
    use crate::dom::to_markup_string;
    use crate::expressions::EvaluatorRegistry;
    use crate::model::Value;
    use crate::rendering::DocumentModifier;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn annotates_the_root_element() {
        let mut doc = Document::new("/srv/templates/page.html", "div");
        let config = RenderingConfig::default()
            .with_source_annotation()
            .with_source_annotation_base_path("/srv/templates");
        let registry = EvaluatorRegistry::new();
        let cancel = CancellationToken::new();
        let scope = RenderScope {
            config: &config,
            registry: &registry,
            cancel: &cancel,
        };
        let processor = SourceAnnotationProcessor::new();
        let modifier = DocumentModifier::new(&processor);
        let root = ExpressionContext::root(doc.root(), Value::Nothing);
        modifier.modify_document(&mut doc, root, &scope).await.unwrap();

        let markup = to_markup_string(&doc);
        assert!(markup.contains("page.html"), "{markup}");
        assert!(!markup.contains("/srv/templates/page.html"), "{markup}");
    }
}
