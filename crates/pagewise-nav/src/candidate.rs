//! Candidate types and target-URL extraction.

use scraper::ElementRef;
use serde::Serialize;

use crate::Direction;
use crate::patterns::URL_ATTRIBUTES;
use crate::scoring::ScoreBreakdown;

/// A scored link considered for one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavCandidate {
    pub resolved_url: String,
    pub direction: Direction,
    pub score: i64,
    /// Position of the element in the document scan. Lower wins ties.
    pub discovery_order: usize,
    pub breakdown: ScoreBreakdown,
}

/// Markers that indicate an onclick handler navigates somewhere.
const LOCATION_MARKERS: &[&str] = &[
    "location.href",
    "window.location",
    "document.location",
    "location.assign",
    "location.replace",
];

/// Raw (unresolved) target of a candidate element.
pub(crate) fn target_url(element: &ElementRef<'_>) -> Option<String> {
    let value = element.value();
    for attr in URL_ATTRIBUTES {
        if let Some(url) = value.attr(attr).map(str::trim).filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }
    }
    value.attr("onclick").and_then(url_from_onclick)
}

/// Pull a quoted URL literal out of a `location` assignment in an onclick handler.
///
/// This is a string scan, not a JavaScript parser: computed URLs, string
/// concatenation and obfuscated handlers yield `None`.
pub fn url_from_onclick(onclick: &str) -> Option<String> {
    let onclick = onclick.trim();
    let marker_end = LOCATION_MARKERS
        .iter()
        .filter_map(|m| onclick.find(m).map(|i| i + m.len()))
        .min()?;

    let rest = &onclick[marker_end..];
    let (open, quote) = rest
        .char_indices()
        .find(|(_, c)| matches!(c, '\'' | '"' | '`'))?;
    let literal = &rest[open + quote.len_utf8()..];
    let close = literal.find(quote)?;
    let url = literal[..close].trim();

    (!url.is_empty()).then(|| url.to_string())
}
