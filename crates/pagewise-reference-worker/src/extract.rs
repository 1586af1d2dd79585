//! A small readability-style extractor built on `scraper`.
//!
//! Picks a content root (`article`, then `main`, then `body`), keeps the
//! outermost block elements under it that are not page chrome, and reads
//! metadata from the usual `<meta>` tags.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use pagewise_core::ExtractionResult;

const MAX_EXCERPT_CHARS: usize = 200;

fn selector(src: &str) -> Selector {
    Selector::parse(src).expect("static selector must parse")
}

static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static ROOTS: Lazy<[Selector; 4]> = Lazy::new(|| {
    [
        selector("article"),
        selector("main"),
        selector("[role='main']"),
        selector("body"),
    ]
});
static BLOCKS: Lazy<Selector> = Lazy::new(|| {
    selector("p, h1, h2, h3, h4, h5, h6, pre, blockquote, ul, ol, table, figure")
});
static CHROME: Lazy<Selector> = Lazy::new(|| {
    selector("nav, header, footer, aside, script, style, noscript, form, [role='navigation']")
});
static TIME: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));

/// Extract the article from `html`, or `None` when there is no readable text.
pub fn extract_article(html: &str, document_url: &str) -> Option<ExtractionResult> {
    let document = Html::parse_document(html);

    let root = ROOTS
        .iter()
        .find_map(|sel| document.select(sel).next())
        .unwrap_or_else(|| document.root_element());

    let blocks: Vec<ElementRef<'_>> = root
        .select(&BLOCKS)
        .filter(|el| !inside(el, &CHROME, &root))
        .filter(|el| !inside(el, &BLOCKS, &root))
        .filter(|el| !collapse_text(el).is_empty())
        .collect();

    let text_content = blocks
        .iter()
        .map(collapse_text)
        .collect::<Vec<_>>()
        .join("\n");
    if text_content.is_empty() {
        return None;
    }
    let content = blocks.iter().map(|el| el.html()).collect::<String>();

    let title = first_text(&document, &TITLE)
        .or_else(|| meta(&document, "og:title"))
        .or_else(|| first_text(&document, &H1))
        .unwrap_or_default();

    let excerpt = meta(&document, "description")
        .or_else(|| meta(&document, "og:description"))
        .unwrap_or_else(|| truncate(&text_content, MAX_EXCERPT_CHARS));

    let site_name = meta(&document, "og:site_name")
        .or_else(|| {
            url::Url::parse(document_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
        })
        .unwrap_or_default();

    let published_time = meta(&document, "article:published_time")
        .or_else(|| {
            document
                .select(&TIME)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_default();

    Some(ExtractionResult {
        title,
        text_content,
        content,
        excerpt,
        site_name,
        published_time,
    })
}

/// True if some ancestor of `el` below `root` matches `sel`.
fn inside(el: &ElementRef<'_>, sel: &Selector, root: &ElementRef<'_>) -> bool {
    el.ancestors()
        .take_while(|node| node.id() != root.id())
        .filter_map(ElementRef::wrap)
        .any(|ancestor| sel.matches(&ancestor))
}

fn collapse_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .map(|el| collapse_text(&el))
        .find(|t| !t.is_empty())
}

/// Content of `<meta name=key>` or `<meta property=key>`.
fn meta(document: &Html, key: &str) -> Option<String> {
    let css = format!("meta[name='{key}'], meta[property='{key}']");
    let sel = Selector::parse(&css).ok()?;
    document
        .select(&sel)
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}
