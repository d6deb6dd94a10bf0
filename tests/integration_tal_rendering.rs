//! End-to-end rendering tests for the TAL attribute directives.

mod common;

use common::{child, render, tal, text};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use zpt::{Document, RenderingConfig, Value, ZptEngine, ZptError};

#[tokio::test]
async fn content_substitutes_and_escapes_text() {
    let mut doc = Document::new("t.html", "p");
    let root = doc.root();
    tal(&mut doc, root, "content", "here/title");

    let model = Value::from(json!({ "title": "a < b" }));
    let markup = render(&mut doc, model).await.unwrap();
    assert_eq!(markup, "<p>a &lt; b</p>");
}

#[tokio::test]
async fn structure_content_injects_raw_markup() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    tal(&mut doc, root, "content", "structure here/markup");

    let model = Value::from(json!({ "markup": "<em>hi</em>" }));
    let markup = render(&mut doc, model).await.unwrap();
    assert_eq!(markup, "<div><em>hi</em></div>");
}

#[tokio::test]
async fn replace_substitutes_the_whole_element() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    let span = child(&mut doc, root, "span");
    tal(&mut doc, span, "replace", "here/name");

    let markup = render(&mut doc, Value::from(json!({ "name": "ada" })))
        .await
        .unwrap();
    assert_eq!(markup, "<div>ada</div>");
}

#[tokio::test]
async fn nothing_removes_content_and_default_keeps_it() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    let a = child(&mut doc, root, "p");
    text(&mut doc, a, "gone");
    tal(&mut doc, a, "content", "nothing");
    let b = child(&mut doc, root, "p");
    text(&mut doc, b, "kept");
    tal(&mut doc, b, "content", "default");

    let markup = render(&mut doc, Value::Nothing).await.unwrap();
    assert_eq!(markup, "<div><p /><p>kept</p></div>");
}

#[tokio::test]
async fn condition_controls_inclusion() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    let yes = child(&mut doc, root, "p");
    text(&mut doc, yes, "shown");
    tal(&mut doc, yes, "condition", "here/on");
    let no = child(&mut doc, root, "p");
    text(&mut doc, no, "hidden");
    tal(&mut doc, no, "condition", "here/off");

    let model = Value::from(json!({ "on": true, "off": [] }));
    let markup = render(&mut doc, model).await.unwrap();
    assert_eq!(markup, "<div><p>shown</p></div>");
}

#[tokio::test]
async fn repeat_fans_out_with_loop_variables() {
    let mut doc = Document::new("t.html", "ul");
    let root = doc.root();
    let li = child(&mut doc, root, "li");
    tal(&mut doc, li, "repeat", "item here/items");
    tal(
        &mut doc,
        li,
        "content",
        "string:${repeat/item/number}. $item",
    );

    let model = Value::from(json!({ "items": ["a", "b", "c"] }));
    let markup = render(&mut doc, model).await.unwrap();
    assert_eq!(markup, "<ul><li>1. a</li><li>2. b</li><li>3. c</li></ul>");
}

#[tokio::test]
async fn repeat_over_nothing_removes_the_element() {
    let mut doc = Document::new("t.html", "ul");
    let root = doc.root();
    let li = child(&mut doc, root, "li");
    tal(&mut doc, li, "repeat", "item nothing");

    let markup = render(&mut doc, Value::Nothing).await.unwrap();
    assert_eq!(markup, "<ul />");
}

#[tokio::test]
async fn repeat_does_not_process_the_original_element() {
    // The original is removed before its children are walked; only the
    // per-iteration clones contribute output.
    let mut doc = Document::new("t.html", "ul");
    let root = doc.root();
    let li = child(&mut doc, root, "li");
    tal(&mut doc, li, "repeat", "item here/items");
    let span = child(&mut doc, li, "span");
    tal(&mut doc, span, "content", "item");

    let model = Value::from(json!({ "items": [1, 2] }));
    let markup = render(&mut doc, model).await.unwrap();
    assert_eq!(markup, "<ul><li><span>1</span></li><li><span>2</span></li></ul>");
}

#[tokio::test]
async fn define_scopes_locals_to_the_subtree() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    let scoped = child(&mut doc, root, "p");
    tal(&mut doc, scoped, "define", "who string:ada");
    tal(&mut doc, scoped, "content", "who");
    let sibling = child(&mut doc, root, "p");
    tal(&mut doc, sibling, "define", "fallback string:unbound");
    tal(&mut doc, sibling, "content", "who | fallback");

    let markup = render(&mut doc, Value::Nothing).await.unwrap();
    assert_eq!(markup, "<div><p>ada</p><p>unbound</p></div>");
}

#[tokio::test]
async fn global_definitions_outlive_their_subtree() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    let first = child(&mut doc, root, "p");
    tal(&mut doc, first, "define", "global who string:ada");
    let second = child(&mut doc, root, "p");
    tal(&mut doc, second, "content", "who");

    let markup = render(&mut doc, Value::Nothing).await.unwrap();
    assert_eq!(markup, "<div><p /><p>ada</p></div>");
}

#[tokio::test]
async fn attributes_set_remove_and_copy() {
    let mut doc = Document::new("t.html", "a");
    let root = doc.root();
    doc.set_attribute(root, zpt::Attribute::new("href", "#"));
    doc.set_attribute(root, zpt::Attribute::new("title", "old"));
    tal(
        &mut doc,
        root,
        "attributes",
        "href here/link; title nothing; selected here/flag",
    );

    let model = Value::from(json!({ "link": "/home", "flag": true }));
    let markup = render(&mut doc, model).await.unwrap();
    assert_eq!(markup, "<a href=\"/home\" selected=\"selected\" />");
}

#[tokio::test]
async fn omit_tag_lifts_children() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    let wrapper = child(&mut doc, root, "span");
    tal(&mut doc, wrapper, "omit-tag", "");
    let inner = child(&mut doc, wrapper, "em");
    tal(&mut doc, inner, "content", "here/word");

    let markup = render(&mut doc, Value::from(json!({ "word": "x" })))
        .await
        .unwrap();
    assert_eq!(markup, "<div><em>x</em></div>");
}

#[tokio::test]
async fn omit_tag_on_the_root_keeps_its_content() {
    // The root has no parent to lift into, so the tag stays and the
    // children survive.
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    tal(&mut doc, root, "omit-tag", "");
    text(&mut doc, root, "kept");

    let markup = render(&mut doc, Value::Nothing).await.unwrap();
    assert_eq!(markup, "<div>kept</div>");
}

#[tokio::test]
async fn on_error_replaces_content_with_the_handler_message() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    tal(&mut doc, root, "on-error", "string:recovered: ${error/message}");
    let inner = child(&mut doc, root, "p");
    tal(&mut doc, inner, "content", "here/missing");

    let markup = render(&mut doc, Value::from(json!({}))).await.unwrap();
    assert!(markup.starts_with("<div>recovered: "), "{markup}");
    assert!(markup.contains("missing"), "{markup}");
}

#[tokio::test]
async fn unhandled_failures_surface_as_rendering_errors() {
    let mut doc = Document::new("t.html", "p");
    let root = doc.root();
    tal(&mut doc, root, "content", "here/missing");

    let err = render(&mut doc, Value::from(json!({}))).await.unwrap_err();
    let ZptError::Rendering { source } = err else {
        panic!("expected the rendering wrapper, got {err}");
    };
    assert!(matches!(*source, ZptError::Evaluation { .. }));
}

#[tokio::test]
async fn cancellation_passes_through_unwrapped() {
    let mut doc = Document::new("t.html", "p");
    let root = doc.root();
    tal(&mut doc, root, "content", "here/x");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let engine = ZptEngine::new();
    let err = engine
        .render_to_string(
            &mut doc,
            Value::Nothing,
            &RenderingConfig::default(),
            cancel,
        )
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn options_builtin_reads_keyword_options() {
    let mut doc = Document::new("t.html", "p");
    let root = doc.root();
    tal(&mut doc, root, "content", "options/title");

    let engine = ZptEngine::new();
    let config = RenderingConfig::default().with_keyword_option("title", "Home");
    let markup = engine
        .render_to_string(&mut doc, Value::Nothing, &config, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(markup, "<p>Home</p>");
}

#[tokio::test]
async fn attrs_builtin_reads_the_original_attributes() {
    let mut doc = Document::new("t.html", "p");
    let root = doc.root();
    doc.set_attribute(root, zpt::Attribute::new("id", "intro"));
    tal(&mut doc, root, "content", "attrs/id");

    let markup = render(&mut doc, Value::Nothing).await.unwrap();
    assert_eq!(markup, "<p id=\"intro\">intro</p>");
}

#[tokio::test]
async fn tal_block_elements_vanish_from_output() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    let block = doc.new_element("tal:block");
    doc.append_child(root, block);
    tal(&mut doc, block, "content", "here/word");

    let markup = render(&mut doc, Value::from(json!({ "word": "free" })))
        .await
        .unwrap();
    assert_eq!(markup, "<div>free</div>");
}
