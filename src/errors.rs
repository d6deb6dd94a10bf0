//! Error types for template parsing, expression evaluation and rendering.

use thiserror::Error;

/// Result type alias for template operations.
pub type Result<T> = std::result::Result<T, ZptError>;

/// Comprehensive error type for all template operations.
///
/// Chain-of-responsibility resolution failures are deliberately *not* errors;
/// they are modelled by [`crate::model::GetValueResult::NotFound`]. Only chain
/// exhaustion surfaces here, as [`ZptError::Evaluation`].
#[derive(Error, Debug)]
pub enum ZptError {
    /// The text of a path expression does not match the path grammar.
    #[error("cannot parse path expression `{expression}`: {reason}")]
    CannotParsePath {
        /// The offending expression text.
        expression: String,
        /// What the parser objected to.
        reason: String,
    },

    /// A single path part could not be resolved against the current object.
    #[error("cannot traverse the path part `{part}`; no value could be retrieved from {object}")]
    Evaluation {
        /// The part name which could not be resolved.
        part: String,
        /// A description of the object against which resolution was attempted.
        object: String,
    },

    /// Every alternate of a path expression failed.  Only raised when there
    /// were two or more alternates; a lone failure is re-thrown unwrapped so
    /// that a likely typo is not obscured by alternate noise.
    #[error("every alternate of path expression `{expression}` failed: [{}]",
        errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    AggregateEvaluation {
        /// The full expression text.
        expression: String,
        /// One failure per attempted alternate, in attempt order.
        errors: Vec<ZptError>,
    },

    /// No expression evaluator is registered for the requested prefix.
    #[error("no expression evaluator is registered for the prefix `{prefix}`")]
    UnknownExpressionPrefix {
        /// The unrecognized prefix.
        prefix: String,
    },

    /// A TAL attribute value does not match the attribute's grammar.
    #[error("invalid `{attribute}` attribute on <{element}>: {reason}")]
    InvalidAttribute {
        /// The attribute name, including its namespace prefix.
        attribute: String,
        /// Tag name of the element carrying the attribute.
        element: String,
        /// What was wrong with the attribute value.
        reason: String,
    },

    /// A use-macro or extend-macro expression did not produce a macro.
    #[error("no macro could be resolved from the expression `{expression}`")]
    MacroNotFound {
        /// The expression which was expected to name a macro.
        expression: String,
    },

    /// A macro expansion re-entered a macro already being expanded.
    #[error("macro expansion cycle detected at `{name}` (expansion stack: {})", stack.join(" -> "))]
    MacroCycle {
        /// The macro whose re-expansion was refused.
        name: String,
        /// The macro keys already on the expansion stack, outermost first.
        stack: Vec<String>,
    },

    /// A failure raised by the external document backend.
    #[error("document error: {0}")]
    Document(String),

    /// The render was cancelled via its cancellation token.  Distinguished
    /// from failure; never wrapped into [`ZptError::Rendering`].
    #[error("the rendering operation was cancelled")]
    Cancelled,

    /// Top-level wrapper: any non-cancellation failure reaching the render
    /// entry point is wrapped in this variant so callers can catch a single
    /// error family regardless of the internal cause.
    #[error("the document could not be rendered: {source}")]
    Rendering {
        /// The underlying failure.
        source: Box<ZptError>,
    },
}

impl ZptError {
    /// True when this error represents cooperative cancellation rather than
    /// a rendering failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ZptError::Cancelled)
    }

    /// Wraps a failure for the top-level render surface.  Cancellation and
    /// already-wrapped errors pass through unchanged.
    pub(crate) fn into_rendering(self) -> ZptError {
        match self {
            ZptError::Cancelled | ZptError::Rendering { .. } => self,
            other => ZptError::Rendering {
                source: Box::new(other),
            },
        }
    }
}
