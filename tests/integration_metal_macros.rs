//! End-to-end tests for METAL macro expansion and slot filling.

mod common;

use common::{child, metal, render, tal, text};
use pretty_assertions::assert_eq;
use serde_json::json;
use zpt::{Document, Value, ZptError};

/// Builds a document whose `<html>` root holds a `page` macro with `header`
/// and `body` slots, plus a use site.
fn layout_and_use_site() -> (Document, zpt::NodeId) {
    let mut doc = Document::new("page.html", "html");
    let root = doc.root();

    let layout = child(&mut doc, root, "section");
    metal(&mut doc, layout, "define-macro", "page");
    let header = child(&mut doc, layout, "h1");
    metal(&mut doc, header, "define-slot", "header");
    text(&mut doc, header, "default header");
    let body = child(&mut doc, layout, "div");
    metal(&mut doc, body, "define-slot", "body");
    text(&mut doc, body, "default body");

    let use_site = child(&mut doc, root, "article");
    metal(&mut doc, use_site, "use-macro", "template/macros/page");
    (doc, use_site)
}

#[tokio::test]
async fn use_macro_replaces_the_use_site_with_the_macro_body() {
    let (mut doc, _) = layout_and_use_site();
    let markup = render(&mut doc, Value::Nothing).await.unwrap();

    // The defining copy and the expansion both render the macro body.
    let occurrences = markup.matches("default header").count();
    assert_eq!(occurrences, 2, "{markup}");
    assert!(!markup.contains("article"), "{markup}");
}

#[tokio::test]
async fn filling_one_slot_of_two_keeps_the_other_default() {
    let (mut doc, use_site) = layout_and_use_site();
    let filler = child(&mut doc, use_site, "div");
    metal(&mut doc, filler, "fill-slot", "body");
    text(&mut doc, filler, "custom body");

    let markup = render(&mut doc, Value::Nothing).await.unwrap();
    assert!(markup.contains("custom body"), "{markup}");
    // One default body from the defining copy, none from the expansion.
    assert_eq!(markup.matches("default body").count(), 1, "{markup}");
    assert_eq!(markup.matches("default header").count(), 2, "{markup}");
}

#[tokio::test]
async fn unmatched_fillers_are_silently_ignored() {
    let (mut doc, use_site) = layout_and_use_site();
    let filler = child(&mut doc, use_site, "div");
    metal(&mut doc, filler, "fill-slot", "no-such-slot");
    text(&mut doc, filler, "orphan");

    let markup = render(&mut doc, Value::Nothing).await.unwrap();
    assert!(!markup.contains("orphan"), "{markup}");
}

#[tokio::test]
async fn expanded_markup_is_processed_by_tal() {
    let mut doc = Document::new("t.html", "html");
    let root = doc.root();
    let layout = child(&mut doc, root, "section");
    metal(&mut doc, layout, "define-macro", "greet");
    let p = child(&mut doc, layout, "p");
    tal(&mut doc, p, "content", "here/name");

    let use_site = child(&mut doc, root, "div");
    metal(&mut doc, use_site, "use-macro", "template/macros/greet");

    let markup = render(&mut doc, Value::from(json!({ "name": "ada" })))
        .await
        .unwrap();
    assert_eq!(markup.matches("<p>ada</p>").count(), 2, "{markup}");
}

#[tokio::test]
async fn extension_chain_resolves_outermost_first() {
    let mut doc = Document::new("t.html", "html");
    let root = doc.root();

    // Base macro with two slots.
    let base = child(&mut doc, root, "section");
    metal(&mut doc, base, "define-macro", "base");
    let title = child(&mut doc, base, "h1");
    metal(&mut doc, title, "define-slot", "title");
    text(&mut doc, title, "base title");
    let content = child(&mut doc, base, "div");
    metal(&mut doc, content, "define-slot", "content");
    text(&mut doc, content, "base content");

    // Middle macro: extends base, fills `title`, re-opens `content`.
    let middle = child(&mut doc, root, "section");
    metal(&mut doc, middle, "define-macro", "middle");
    metal(&mut doc, middle, "extend-macro", "template/macros/base");
    let mid_title = child(&mut doc, middle, "h1");
    metal(&mut doc, mid_title, "fill-slot", "title");
    text(&mut doc, mid_title, "middle title");
    let mid_content = child(&mut doc, middle, "div");
    metal(&mut doc, mid_content, "fill-slot", "content");
    metal(&mut doc, mid_content, "define-slot", "content");
    text(&mut doc, mid_content, "middle content");

    // Leaf macro: extends middle, keeps everything.
    let leaf = child(&mut doc, root, "section");
    metal(&mut doc, leaf, "define-macro", "leaf");
    metal(&mut doc, leaf, "extend-macro", "template/macros/middle");

    let use_site = child(&mut doc, root, "div");
    metal(&mut doc, use_site, "use-macro", "template/macros/leaf");
    let filler = child(&mut doc, use_site, "p");
    metal(&mut doc, filler, "fill-slot", "content");
    text(&mut doc, filler, "use-site content");

    let markup = render(&mut doc, Value::Nothing).await.unwrap();
    // The expansion carries middle's title filler and the use site's content
    // filler; each defining copy renders its own text exactly once.
    assert!(markup.contains("use-site content"), "{markup}");
    assert_eq!(markup.matches("middle title").count(), 2, "{markup}");
    assert_eq!(markup.matches("base content").count(), 1, "{markup}");
    assert_eq!(markup.matches("base title").count(), 1, "{markup}");
}

#[tokio::test]
async fn cyclic_expansion_fails_fast() {
    let mut doc = Document::new("t.html", "html");
    let root = doc.root();
    let a = child(&mut doc, root, "section");
    metal(&mut doc, a, "define-macro", "a");
    let inner = child(&mut doc, a, "div");
    metal(&mut doc, inner, "use-macro", "template/macros/a");

    let use_site = child(&mut doc, root, "div");
    metal(&mut doc, use_site, "use-macro", "template/macros/a");

    let err = render(&mut doc, Value::Nothing).await.unwrap_err();
    let ZptError::Rendering { source } = err else {
        panic!("expected the rendering wrapper");
    };
    assert!(matches!(*source, ZptError::MacroCycle { .. }), "{source}");
}

#[tokio::test]
async fn cyclic_extension_fails_fast() {
    let mut doc = Document::new("t.html", "html");
    let root = doc.root();
    let a = child(&mut doc, root, "section");
    metal(&mut doc, a, "define-macro", "a");
    metal(&mut doc, a, "extend-macro", "template/macros/b");
    let b = child(&mut doc, root, "section");
    metal(&mut doc, b, "define-macro", "b");
    metal(&mut doc, b, "extend-macro", "template/macros/a");

    let use_site = child(&mut doc, root, "div");
    metal(&mut doc, use_site, "use-macro", "template/macros/a");

    let err = render(&mut doc, Value::Nothing).await.unwrap_err();
    let ZptError::Rendering { source } = err else {
        panic!("expected the rendering wrapper");
    };
    assert!(matches!(*source, ZptError::MacroCycle { .. }), "{source}");
}

#[tokio::test]
async fn an_expression_yielding_no_macro_is_an_error() {
    let mut doc = Document::new("t.html", "div");
    let root = doc.root();
    let use_site = child(&mut doc, root, "p");
    metal(&mut doc, use_site, "use-macro", "here/not_a_macro");

    let err = render(&mut doc, Value::from(json!({ "not_a_macro": 5 })))
        .await
        .unwrap_err();
    let ZptError::Rendering { source } = err else {
        panic!("expected the rendering wrapper");
    };
    assert!(matches!(*source, ZptError::MacroNotFound { .. }), "{source}");
}
