//! Per-render configuration.

use indexmap::IndexMap;

use crate::model::Value;

/// Configuration for a single rendering operation.
///
/// Built with [`RenderingConfig::default`] plus the `with_*` builders; a
/// config is cheap to clone and is never mutated by the engine.
#[derive(Debug, Clone)]
pub struct RenderingConfig {
    /// Host-supplied keyword options, exposed as the `options` builtin.
    pub keyword_options: IndexMap<String, Value>,
    /// The dialect prefix assumed when an expression carries none.
    pub default_expression_prefix: String,
    /// Whether to insert source-annotation comments into the output.
    pub include_source_annotation: bool,
    /// Base path stripped from document names in source annotations.
    pub source_annotation_base_path: Option<String>,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            keyword_options: IndexMap::new(),
            default_expression_prefix: "path".to_owned(),
            include_source_annotation: false,
            source_annotation_base_path: None,
        }
    }
}

impl RenderingConfig {
    /// Adds a keyword option visible through the `options` builtin.
    pub fn with_keyword_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword_options.insert(name.into(), value.into());
        self
    }

    /// Overrides the default expression-dialect prefix.
    pub fn with_default_expression_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_expression_prefix = prefix.into();
        self
    }

    /// Enables source-annotation comments in the output.
    pub fn with_source_annotation(mut self) -> Self {
        self.include_source_annotation = true;
        self
    }

    /// Sets the base path stripped from annotated document names.
    pub fn with_source_annotation_base_path(mut self, base: impl Into<String>) -> Self {
        self.source_annotation_base_path = Some(base.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_the_path_dialect() {
        let config = RenderingConfig::default();
        assert_eq!(config.default_expression_prefix, "path");
        assert!(!config.include_source_annotation);
        assert!(config.keyword_options.is_empty());
    }

    #[test]
    fn builders_compose() {
        let config = RenderingConfig::default()
            .with_keyword_option("title", "Home")
            .with_source_annotation()
            .with_source_annotation_base_path("/srv/templates");
        assert_eq!(config.keyword_options.len(), 1);
        assert!(config.include_source_annotation);
        assert_eq!(
            config.source_annotation_base_path.as_deref(),
            Some("/srv/templates")
        );
    }
}
