//! The parsed model of a path expression.

/// A complete path expression: one or more alternates separated by `|`,
/// attempted left to right until one succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    /// The alternates, in attempt order. Never empty.
    pub alternates: Vec<AlternateExpression>,
}

/// One alternate: a sequence of parts separated by `/`, traversed left to
/// right. An alternate with zero parts denotes the root object itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternateExpression {
    /// The traversal steps, outermost first.
    pub parts: Vec<PathPart>,
}

/// One traversal step of an alternate.
#[derive(Debug, Clone, PartialEq)]
pub enum PathPart {
    /// A literal member name.
    Named(String),
    /// An interpolated step, `${inner}`: the inner expression is evaluated
    /// against the same root context and its string coercion becomes the
    /// member name.
    Interpolated {
        /// The inner expression text, kept for error messages.
        text: String,
        /// The parsed inner expression.
        expression: PathExpression,
    },
}
