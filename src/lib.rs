//! A ZPT-style template engine: TALES path expressions, TAL attribute
//! directives and METAL macro expansion over an in-memory document tree.
//!
//! Templates are ordinary markup documents; behavior lives in namespaced
//! attributes. `tal:` attributes mutate the tree (conditional inclusion,
//! repetition, content and attribute substitution), `metal:` attributes
//! compose documents from reusable macros with named slots, and both are
//! driven by TALES path expressions (`here/user/name | options/fallback`)
//! evaluated against a host-supplied object graph.
//!
//! The crate ships no markup parser. Documents are built programmatically
//! through [`Document`], or by an external backend plugged in via
//! [`DocumentProvider`].
//!
//! # Quick start
//!
//! ```
//! use tokio_util::sync::CancellationToken;
//! use zpt::{Attribute, Document, RenderingConfig, Value, ZptEngine};
//!
//! let mut doc = Document::new("list.html", "ul");
//! let li = doc.new_element("li");
//! doc.set_attribute(li, Attribute::namespaced("tal", "repeat", "item here/items"));
//! doc.set_attribute(li, Attribute::namespaced("tal", "content", "item"));
//! doc.append_child(doc.root(), li);
//!
//! let model = Value::from(serde_json::json!({ "items": ["a", "b"] }));
//! let engine = ZptEngine::new();
//! let markup = tokio::runtime::Runtime::new()
//!     .unwrap()
//!     .block_on(engine.render_to_string(
//!         &mut doc,
//!         model,
//!         &RenderingConfig::default(),
//!         CancellationToken::new(),
//!     ))
//!     .unwrap();
//! assert_eq!(markup, "<ul><li>a</li><li>b</li></ul>");
//! ```

pub mod config;
pub mod dom;
pub mod engine;
pub mod errors;
pub mod expressions;
pub mod metal;
pub mod model;
pub mod rendering;
pub mod tal;

pub use config::RenderingConfig;
pub use dom::{
    to_markup_string, Attribute, AttributeSpec, Document, DocumentProvider, Node, NodeId,
    NodeKind, METAL_NAMESPACE, TAL_NAMESPACE,
};
pub use engine::ZptEngine;
pub use errors::{Result, ZptError};
pub use expressions::path::{
    parse as parse_path, PathExpression, ResolutionTarget, ValueResolutionChain, ValueResolver,
};
pub use expressions::{
    EvaluationScope, EvaluatorRegistry, ExpressionContext, ExpressionEvaluator,
};
pub use model::{GetValueResult, PropertyBag, Reflective, TalesValueSource, Value};
pub use tal::RepetitionInfo;
