//! Shared helpers for the end-to-end rendering tests.
#![allow(dead_code)]

use tokio_util::sync::CancellationToken;
use zpt::{Attribute, Document, NodeId, RenderingConfig, Result, Value, ZptEngine};

/// Renders a document against a model with default config.
pub async fn render(document: &mut Document, model: Value) -> Result<String> {
    let engine = ZptEngine::new();
    engine
        .render_to_string(
            document,
            model,
            &RenderingConfig::default(),
            CancellationToken::new(),
        )
        .await
}

/// Adds a `tal:`-namespaced attribute to a node.
pub fn tal(document: &mut Document, node: NodeId, name: &str, value: &str) {
    document.set_attribute(node, Attribute::namespaced("tal", name, value));
}

/// Adds a `metal:`-namespaced attribute to a node.
pub fn metal(document: &mut Document, node: NodeId, name: &str, value: &str) {
    document.set_attribute(node, Attribute::namespaced("metal", name, value));
}

/// Appends a new child element and returns its handle.
pub fn child(document: &mut Document, parent: NodeId, tag: &str) -> NodeId {
    let node = document.new_element(tag);
    document.append_child(parent, node);
    node
}

/// Appends a text node to an element.
pub fn text(document: &mut Document, parent: NodeId, content: &str) {
    let node = document.new_text(content);
    document.append_child(parent, node);
}
