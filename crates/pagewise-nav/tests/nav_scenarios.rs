//! End-to-end navigation inference over realistic page layouts.

use pagewise_nav::{Direction, NavInferenceEngine, NavLinks, infer_nav, select_best};

const BASE: &str = "https://site.example/ch1";

/// A `<ul>` with `n` archive links followed by one "Next" link.
fn archive_list_with_next(n: usize, next_href: &str) -> String {
    let mut html = String::from("<ul class=\"archive\">");
    for i in 0..n {
        html.push_str(&format!(r#"<li><a href="/archive/{i}">Chapter {i}</a></li>"#));
    }
    html.push_str(&format!(r#"<li><a href="{next_href}">Next</a></li></ul>"#));
    html
}

#[test]
fn rel_next_inside_nav() {
    let html = r#"<html><body>
        <article><p>Chapter one text.</p></article>
        <nav><a rel="next" href="/ch2">Next Chapter</a></nav>
    </body></html>"#;
    let links = infer_nav(html, BASE);
    assert_eq!(links.next, "https://site.example/ch2");
    assert_eq!(links.prev, "");
}

#[test]
fn nav_landmark_beats_large_list() {
    // The list candidate comes first in the document, so it would win a tie.
    let html = format!(
        r#"<html><body>{}<nav><a href="/from-nav">Next</a></nav></body></html>"#,
        archive_list_with_next(20, "/from-list")
    );
    let engine = NavInferenceEngine::new();
    let candidates = engine.candidates(&html, BASE);

    let list = candidates
        .iter()
        .find(|c| c.resolved_url.ends_with("/from-list"))
        .expect("list candidate discovered");
    let nav = candidates
        .iter()
        .find(|c| c.resolved_url.ends_with("/from-nav"))
        .expect("nav candidate discovered");
    assert!(list.discovery_order < nav.discovery_order);
    assert_eq!(list.breakdown.large_list, -100);
    assert_eq!(nav.breakdown.landmark, 500);

    assert_eq!(
        engine.infer(&html, BASE).next,
        "https://site.example/from-nav"
    );
}

#[test]
fn external_next_link_is_excluded() {
    let html = r#"<nav>
        <a rel="next" href="https://other.example/ch2">Next</a>
        <a href="//cdn.other.example/next">Next page</a>
    </nav>"#;
    let engine = NavInferenceEngine::new();
    assert!(engine.candidates(html, BASE).is_empty());
    assert_eq!(engine.infer(html, BASE), NavLinks::default());
}

#[test]
fn missing_direction_is_empty_string() {
    let html = r#"<nav><a href="/ch2">Next</a></nav>"#;
    let links = infer_nav(html, BASE);
    assert_eq!(links.next, "https://site.example/ch2");
    assert!(links.prev.is_empty());
}

#[test]
fn ties_go_to_first_encountered() {
    let html = r#"<p><a href="/first">Next</a></p><p><a href="/second">Next</a></p>"#;
    assert_eq!(infer_nav(html, BASE).next, "https://site.example/first");
}

#[test]
fn sidebar_link_loses_to_plain_link() {
    let html = r#"
        <div id="sidebar"><a href="/popular">Next</a></div>
        <div class="entry"><a href="/ch2">Next</a></div>"#;
    assert_eq!(infer_nav(html, BASE).next, "https://site.example/ch2");
}

#[test]
fn wordpress_post_navigation() {
    let html = r#"
        <nav class="navigation post-navigation" aria-label="Posts">
          <div class="nav-links">
            <div class="nav-previous"><a href="/ch0" rel="prev">Previous Chapter</a></div>
            <div class="nav-next"><a href="/ch2" rel="next">Next Chapter</a></div>
          </div>
        </nav>
        <div class="widget-area"><ul>
          <li><a href="/recent-1">Continue</a></li>
        </ul></div>"#;
    let links = infer_nav(html, BASE);
    assert_eq!(links.next, "https://site.example/ch2");
    assert_eq!(links.prev, "https://site.example/ch0");
}

#[test]
fn localized_phrases() {
    let cases = [
        (r#"<a href="/s">Capítulo siguiente</a>"#, "https://site.example/s"),
        (r#"<a href="/w">Weiter</a>"#, "https://site.example/w"),
        (r#"<a href="/f">Suivant</a>"#, "https://site.example/f"),
    ];
    for (html, expected) in cases {
        assert_eq!(infer_nav(html, BASE).next, expected, "html: {html}");
    }

    let html = r#"<a href="/z">Zurück</a>"#;
    assert_eq!(infer_nav(html, BASE).prev, "https://site.example/z");
}

#[test]
fn glyph_only_links() {
    let html = r#"<a href="/ch0">←</a> <a href="/ch2">→</a>"#;
    let links = infer_nav(html, BASE);
    assert_eq!(links.next, "https://site.example/ch2");
    assert_eq!(links.prev, "https://site.example/ch0");
}

#[test]
fn data_href_span_in_pagination() {
    let html = r#"<div class="pagination">
        <span class="page-link" data-href="/ch1?p=0">1</span>
        <span class="next" data-href="/ch2">Next</span>
    </div>"#;
    assert_eq!(infer_nav(html, BASE).next, "https://site.example/ch2");
}

#[test]
fn inference_is_deterministic() {
    let html = archive_list_with_next(30, "/list-next");
    let engine = NavInferenceEngine::new();
    let first = engine.candidates(&html, BASE);
    for _ in 0..5 {
        assert_eq!(engine.candidates(&html, BASE), first);
    }
    assert_eq!(
        select_best(&first, Direction::Next).map(|c| c.resolved_url.as_str()),
        Some("https://site.example/list-next")
    );
}
