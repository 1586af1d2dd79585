//! Phrase dictionaries and CSS selectors used for candidate discovery and scoring.

use once_cell::sync::Lazy;
use scraper::Selector;

/// Lowercase phrases that mark a "next" link, in text or attributes.
pub const NEXT_PHRASES: &[&str] = &[
    "next",
    "→",
    ">",
    ">>",
    "»",
    "next chapter",
    "continue reading",
    "continue",
    "read more",
    "next page",
    "forward",
    "next post",
    "next article",
    "next entry",
    "next story",
    "next part",
    "next section",
    "proceed",
    "advance",
    "onward",
    // es
    "siguiente",
    "capítulo siguiente",
    "próximo",
    // de
    "weiter",
    "nächste",
    "nächstes kapitel",
    // fr
    "suivant",
    "chapitre suivant",
];

/// Lowercase phrases that mark a "previous" link.
pub const PREVIOUS_PHRASES: &[&str] = &[
    "previous",
    "prev",
    "←",
    "<",
    "<<",
    "«",
    "back",
    "previous chapter",
    "prev chapter",
    "previous page",
    "back to",
    "previous post",
    "prev post",
    "previous article",
    "prev article",
    "previous entry",
    "prev entry",
    "previous story",
    "prev story",
    "previous part",
    "prev part",
    "previous section",
    "prev section",
    "return",
    "go back",
    // es
    "anterior",
    "capítulo anterior",
    // de
    "zurück",
    "vorherige",
    // fr
    "précédent",
    "chapitre précédent",
];

/// Class fragments used by themes and CMSes for pagination blocks.
pub const NAV_CLASS_VOCABULARY: &[&str] = &[
    "nav-next",
    "nav-previous",
    "navigation",
    "pager",
    "pagination",
];

/// Attributes (besides text) checked for phrase matches, in scoring order.
pub const MATCH_ATTRIBUTES: &[&str] = &["id", "class", "title", "aria-label", "alt"];

/// Attributes that may carry a target URL directly, in priority order.
pub const URL_ATTRIBUTES: &[&str] = &["href", "data-href", "data-url", "data-link"];

const CANDIDATE_SELECTOR_SRC: &str = "
    a[href],
    link[rel][href],
    button[onclick],
    button[data-href],
    button[data-url],
    button[data-link],
    nav a,
    nav button,
    nav span,
    nav div,
    div[onclick],
    div[data-href],
    div[data-url],
    div[data-link],
    span[onclick],
    span[data-href],
    span[data-url],
    span[data-link],
    [role='button'],
    [role='link'],
    .btn,
    .button,
    .nav-link,
    .navigation,
    .pager,
    .pagination,
    .next,
    .prev,
    .previous,
    .continue,
    .forward,
    .back,
    li a,
    li button,
    li span,
    li div,
    .page-numbers,
    .page-link,
    .wp-pagenavi,
    input[type='button'],
    input[type='submit']
";

fn selector(src: &str) -> Selector {
    Selector::parse(src).expect("static selector must parse")
}

/// Every element that could act as a navigation control.
pub static CANDIDATES: Lazy<Selector> = Lazy::new(|| selector(CANDIDATE_SELECTOR_SRC));

/// Navigation landmarks.
pub static LANDMARK: Lazy<Selector> = Lazy::new(|| selector("nav, [role='navigation']"));

/// Sidebar and widget areas.
pub static SIDEBAR: Lazy<Selector> = Lazy::new(|| {
    selector("#sidebar, #secondary, .widget-area, .sidebar, [role='complementary']")
});

pub static LIST: Lazy<Selector> = Lazy::new(|| selector("ul, ol"));

pub static LINK: Lazy<Selector> = Lazy::new(|| selector("a"));
