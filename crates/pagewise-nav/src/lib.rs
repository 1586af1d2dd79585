//! Next/previous link inference for paginated documents.
//!
//! Pipeline:
//! 1. Scan the document with a broad selector for anything clickable
//! 2. Pull a target URL from `href`, `data-*` attributes or an `onclick` handler
//! 3. Drop targets that are off-site or point back at the same page
//! 4. Classify each survivor per direction (`rel` token or phrase match)
//! 5. Score it (see [`scoring`]) and keep the best per direction
//!
//! Inference is pure and deterministic: the same HTML and base URL always
//! yield the same links, with ties going to the element found first.

use std::fmt;

use scraper::Html;
use serde::Serialize;

use pagewise_core::url_utils::{is_same_site_different_page, resolve_url};

pub mod candidate;
pub mod patterns;
pub mod scoring;

pub use candidate::{NavCandidate, url_from_onclick};
pub use scoring::{NavScoringWeights, ScoreBreakdown, score_element};

/// Link direction relative to the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Next, Direction::Previous];

    pub fn phrases(self) -> &'static [&'static str] {
        match self {
            Direction::Next => patterns::NEXT_PHRASES,
            Direction::Previous => patterns::PREVIOUS_PHRASES,
        }
    }

    pub fn rel_tokens(self) -> &'static [&'static str] {
        match self {
            Direction::Next => &["next"],
            Direction::Previous => &["prev", "previous"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::Previous => "previous",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best links found in a document. Empty strings mean "none found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavLinks {
    pub next: String,
    pub prev: String,
}

/// Scores candidate links with configurable weights.
#[derive(Debug, Clone, Default)]
pub struct NavInferenceEngine {
    weights: NavScoringWeights,
}

impl NavInferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: NavScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &NavScoringWeights {
        &self.weights
    }

    /// Find the best next and previous links in `html`.
    pub fn infer(&self, html: &str, base_url: &str) -> NavLinks {
        let candidates = self.candidates(html, base_url);
        let links = NavLinks {
            next: select_best(&candidates, Direction::Next)
                .map(|c| c.resolved_url.clone())
                .unwrap_or_default(),
            prev: select_best(&candidates, Direction::Previous)
                .map(|c| c.resolved_url.clone())
                .unwrap_or_default(),
        };
        tracing::debug!(
            base_url,
            candidates = candidates.len(),
            next = %links.next,
            prev = %links.prev,
            "navigation inferred"
        );
        links
    }

    /// Every qualifying candidate, both directions, in discovery order.
    pub fn candidates(&self, html: &str, base_url: &str) -> Vec<NavCandidate> {
        let document = Html::parse_document(html);
        let mut candidates = Vec::new();

        for (order, element) in document.select(&patterns::CANDIDATES).enumerate() {
            let Some(target) = candidate::target_url(&element) else {
                continue;
            };
            if !is_same_site_different_page(base_url, &target) {
                continue;
            }
            let Ok(resolved_url) = resolve_url(base_url, &target) else {
                continue;
            };

            for direction in Direction::ALL {
                if !scoring::has_rel(&element, direction)
                    && !scoring::matches_phrases(&element, direction)
                {
                    continue;
                }
                let breakdown = score_element(&element, direction, &self.weights);
                candidates.push(NavCandidate {
                    resolved_url: resolved_url.clone(),
                    direction,
                    score: breakdown.total(),
                    discovery_order: order,
                    breakdown,
                });
            }
        }

        candidates
    }
}

/// Highest-scoring candidate for `direction`; the earliest one wins ties.
pub fn select_best(candidates: &[NavCandidate], direction: Direction) -> Option<&NavCandidate> {
    candidates
        .iter()
        .filter(|c| c.direction == direction)
        .fold(None, |best: Option<&NavCandidate>, c| match best {
            Some(b) if (b.score, std::cmp::Reverse(b.discovery_order))
                >= (c.score, std::cmp::Reverse(c.discovery_order)) =>
            {
                Some(b)
            }
            _ => Some(c),
        })
}

/// Infer navigation links with the default weights.
pub fn infer_nav(html: &str, base_url: &str) -> NavLinks {
    NavInferenceEngine::default().infer(html, base_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://site.example/book/ch1";

    fn candidate(url: &str, score: i64, order: usize) -> NavCandidate {
        NavCandidate {
            resolved_url: url.to_string(),
            direction: Direction::Next,
            score,
            discovery_order: order,
            breakdown: ScoreBreakdown::default(),
        }
    }

    #[test]
    fn select_best_prefers_score_then_order() {
        let candidates = vec![
            candidate("/a", 100, 0),
            candidate("/b", 300, 1),
            candidate("/c", 300, 2),
        ];
        assert_eq!(
            select_best(&candidates, Direction::Next).unwrap().resolved_url,
            "/b"
        );
        assert!(select_best(&candidates, Direction::Previous).is_none());
    }

    #[test]
    fn both_directions_found() {
        let html = r#"
            <div class="chapter-nav">
              <a href="/book/ch0">&laquo; Previous</a>
              <a href="/book/ch2">Next &raquo;</a>
            </div>"#;
        let links = infer_nav(html, BASE);
        assert_eq!(links.prev, "https://site.example/book/ch0");
        assert_eq!(links.next, "https://site.example/book/ch2");
    }

    #[test]
    fn relative_targets_resolve_against_base() {
        let html = r#"<a href="ch2">Next</a>"#;
        assert_eq!(infer_nav(html, BASE).next, "https://site.example/book/ch2");
    }

    #[test]
    fn onclick_button_is_a_candidate() {
        let html = r#"<button onclick="window.location.href='/book/ch2'">Next</button>"#;
        assert_eq!(infer_nav(html, BASE).next, "https://site.example/book/ch2");
    }

    #[test]
    fn head_link_rel_next_is_used() {
        let html = r#"<html><head><link rel="next" href="/book/ch2"></head>
            <body><p>text</p></body></html>"#;
        assert_eq!(infer_nav(html, BASE).next, "https://site.example/book/ch2");
    }

    #[test]
    fn same_page_anchor_is_ignored() {
        let html = r##"<a href="#comments">Next</a>"##;
        assert_eq!(infer_nav(html, BASE), NavLinks::default());
    }

    #[test]
    fn invalid_base_yields_nothing() {
        let html = r#"<a rel="next" href="/ch2">Next</a>"#;
        assert_eq!(infer_nav(html, "not a url"), NavLinks::default());
    }

    #[test]
    fn garbage_input_yields_nothing() {
        assert_eq!(infer_nav("<<<>>>\u{0}</a></nav", BASE), NavLinks::default());
        assert_eq!(infer_nav("", BASE), NavLinks::default());
    }

    #[test]
    fn conflicting_element_may_match_both_directions() {
        let html = r#"<a href="/book/x">Next / Previous</a>"#;
        let links = infer_nav(html, BASE);
        assert_eq!(links.next, "https://site.example/book/x");
        assert_eq!(links.prev, "https://site.example/book/x");
    }

    #[test]
    fn candidates_report_discovery_order() {
        let html = r#"<a href="/book/a">Next</a><p></p><a href="/book/b">Next</a>"#;
        let engine = NavInferenceEngine::new();
        let found = engine.candidates(html, BASE);
        assert_eq!(found.len(), 2);
        assert!(found[0].discovery_order < found[1].discovery_order);
        assert_eq!(found[0].score, found[1].score);
    }
}
