//! Additive scoring of navigation candidates.
//!
//! Each candidate is scored per direction from independent signals: semantic
//! `rel`, landmark ancestry, pagination class names, phrase-match quality in
//! text and attributes, and penalties for sidebars and long link lists. The
//! defaults keep the tiers ordered: `rel` > landmark > class > text > attribute.

use scraper::{ElementRef, Selector};
use serde::Serialize;

use pagewise_core::config_file::NavConfig;

use crate::Direction;
use crate::patterns::{LANDMARK, LINK, LIST, MATCH_ATTRIBUTES, NAV_CLASS_VOCABULARY, SIDEBAR};

/// Weights for the scoring function.
///
/// The absolute values are empirical; only their relative order matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavScoringWeights {
    /// Element carries the direction's `rel` token.
    pub rel_bonus: i64,
    /// Element sits inside a navigation landmark.
    pub landmark_bonus: i64,
    /// Element class matches [`NAV_CLASS_VOCABULARY`].
    pub nav_class_bonus: i64,
    /// Scale applied to the best phrase/text length ratio.
    pub text_match_scale: i64,
    /// Scale applied to the best phrase/attribute length ratio.
    pub attribute_match_scale: i64,
    /// Subtracted when the element sits in a sidebar or widget area.
    pub sidebar_penalty: i64,
    /// Subtracted when the enclosing list holds too many links.
    pub large_list_penalty: i64,
    /// A list with more links than this counts as large.
    pub large_list_threshold: usize,
}

impl Default for NavScoringWeights {
    fn default() -> Self {
        Self {
            rel_bonus: 1000,
            landmark_bonus: 500,
            nav_class_bonus: 300,
            text_match_scale: 100,
            attribute_match_scale: 50,
            sidebar_penalty: 200,
            large_list_penalty: 100,
            large_list_threshold: 10,
        }
    }
}

impl NavScoringWeights {
    /// Apply the overrides present in a `[nav]` config section.
    pub fn with_overrides(self, config: &NavConfig) -> Self {
        Self {
            rel_bonus: config.rel_bonus.unwrap_or(self.rel_bonus),
            landmark_bonus: config.landmark_bonus.unwrap_or(self.landmark_bonus),
            nav_class_bonus: config.nav_class_bonus.unwrap_or(self.nav_class_bonus),
            text_match_scale: config.text_match_scale.unwrap_or(self.text_match_scale),
            attribute_match_scale: config
                .attribute_match_scale
                .unwrap_or(self.attribute_match_scale),
            sidebar_penalty: config.sidebar_penalty.unwrap_or(self.sidebar_penalty),
            large_list_penalty: config.large_list_penalty.unwrap_or(self.large_list_penalty),
            large_list_threshold: config
                .large_list_threshold
                .unwrap_or(self.large_list_threshold),
        }
    }
}

/// Per-signal contributions to a candidate's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub rel: i64,
    pub landmark: i64,
    pub nav_class: i64,
    pub text_match: i64,
    pub attribute_match: i64,
    pub sidebar: i64,
    pub large_list: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.rel
            + self.landmark
            + self.nav_class
            + self.text_match
            + self.attribute_match
            + self.sidebar
            + self.large_list
    }
}

/// Lowercased, whitespace-collapsed text content of an element.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn attr_lower(element: &ElementRef<'_>, name: &str) -> String {
    element
        .value()
        .attr(name)
        .map(|v| v.trim().to_lowercase())
        .unwrap_or_default()
}

/// The element itself or its nearest ancestor matching `selector`.
fn closest<'a>(element: &ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    std::iter::once(*element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|el| selector.matches(el))
}

/// True if the element's `rel` attribute carries one of the direction's tokens.
pub(crate) fn has_rel(element: &ElementRef<'_>, direction: Direction) -> bool {
    let rel = attr_lower(element, "rel");
    rel.split_whitespace()
        .any(|token| direction.rel_tokens().iter().any(|t| *t == token))
}

/// True if text or any matched attribute contains one of the direction's phrases.
pub(crate) fn matches_phrases(element: &ElementRef<'_>, direction: Direction) -> bool {
    let text = element_text(element);
    let fields = std::iter::once(text)
        .chain(MATCH_ATTRIBUTES.iter().map(|a| attr_lower(element, a)))
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>();

    direction
        .phrases()
        .iter()
        .any(|phrase| fields.iter().any(|field| field.contains(phrase)))
}

/// Best `phrase chars / field chars` ratio over all phrases contained in `field`.
fn best_ratio(field: &str, phrases: &[&str]) -> f64 {
    if field.is_empty() {
        return 0.0;
    }
    let field_len = field.chars().count() as f64;
    phrases
        .iter()
        .filter(|phrase| field.contains(*phrase))
        .map(|phrase| phrase.chars().count() as f64 / field_len)
        .fold(0.0, f64::max)
}

fn scaled(scale: i64, ratio: f64) -> i64 {
    (scale as f64 * ratio.min(1.0)) as i64
}

/// Score `element` as a candidate for `direction`.
pub fn score_element(
    element: &ElementRef<'_>,
    direction: Direction,
    weights: &NavScoringWeights,
) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown::default();
    let phrases = direction.phrases();

    if has_rel(element, direction) {
        breakdown.rel = weights.rel_bonus;
    }

    if closest(element, &LANDMARK).is_some() {
        breakdown.landmark = weights.landmark_bonus;
    }

    let class = attr_lower(element, "class");
    if NAV_CLASS_VOCABULARY.iter().any(|c| class.contains(c)) {
        breakdown.nav_class = weights.nav_class_bonus;
    }

    breakdown.text_match = scaled(
        weights.text_match_scale,
        best_ratio(&element_text(element), phrases),
    );

    let attribute_ratio = MATCH_ATTRIBUTES
        .iter()
        .map(|a| best_ratio(&attr_lower(element, a), phrases))
        .fold(0.0, f64::max);
    breakdown.attribute_match = scaled(weights.attribute_match_scale, attribute_ratio);

    if closest(element, &SIDEBAR).is_some() {
        breakdown.sidebar = -weights.sidebar_penalty;
    }

    if let Some(list) = closest(element, &LIST)
        && list.select(&LINK).count() > weights.large_list_threshold
    {
        breakdown.large_list = -weights.large_list_penalty;
    }

    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn score_first(html: &str, css: &str, direction: Direction) -> ScoreBreakdown {
        let doc = Html::parse_document(html);
        let sel = Selector::parse(css).unwrap();
        let el = doc.select(&sel).next().expect("element present");
        score_element(&el, direction, &NavScoringWeights::default())
    }

    #[test]
    fn best_ratio_exact_match() {
        assert_eq!(best_ratio("next", &["next", "next chapter"]), 1.0);
    }

    #[test]
    fn best_ratio_takes_longest_contained_phrase() {
        let ratio = best_ratio("next chapter »", &["next", "next chapter"]);
        assert!((ratio - 12.0 / 14.0).abs() < 1e-9, "ratio {ratio}");
    }

    #[test]
    fn best_ratio_counts_chars_not_bytes() {
        assert_eq!(best_ratio("→", &["→"]), 1.0);
    }

    #[test]
    fn best_ratio_empty_field() {
        assert_eq!(best_ratio("", &["next"]), 0.0);
    }

    #[test]
    fn rel_in_nav() {
        let html = r#"<nav><a rel="next" href="/ch2">Next Chapter</a></nav>"#;
        let b = score_first(html, "a", Direction::Next);
        assert_eq!(b.rel, 1000);
        assert_eq!(b.landmark, 500);
        assert_eq!(b.text_match, 100);
        assert_eq!(b.total(), 1600);
    }

    #[test]
    fn rel_is_direction_specific() {
        let html = r#"<a rel="prev" href="/ch0">Back</a>"#;
        assert_eq!(score_first(html, "a", Direction::Next).rel, 0);
        assert_eq!(score_first(html, "a", Direction::Previous).rel, 1000);
    }

    #[test]
    fn rel_token_list() {
        let html = r#"<a rel="nofollow next" href="/p/2">2</a>"#;
        assert_eq!(score_first(html, "a", Direction::Next).rel, 1000);
    }

    #[test]
    fn nav_class_and_attribute_match() {
        let html = r#"<a class="nav-next" href="/2">Onward we go</a>"#;
        let b = score_first(html, "a", Direction::Next);
        assert_eq!(b.nav_class, 300);
        // "next" in "nav-next": 4 / 8
        assert_eq!(b.attribute_match, 25);
    }

    #[test]
    fn role_navigation_counts_as_landmark() {
        let html = r#"<div role="navigation"><a href="/2">Next</a></div>"#;
        assert_eq!(score_first(html, "a", Direction::Next).landmark, 500);
    }

    #[test]
    fn sidebar_penalty() {
        let html = r#"<aside class="sidebar"><a href="/2">Next</a></aside>"#;
        assert_eq!(score_first(html, "a", Direction::Next).sidebar, -200);
    }

    #[test]
    fn large_list_penalty_threshold() {
        let items = |n: usize| {
            (0..n)
                .map(|i| format!(r#"<li><a href="/p/{i}">Next</a></li>"#))
                .collect::<String>()
        };
        let small = format!("<ul>{}</ul>", items(10));
        assert_eq!(score_first(&small, "a", Direction::Next).large_list, 0);

        let large = format!("<ul>{}</ul>", items(11));
        assert_eq!(score_first(&large, "a", Direction::Next).large_list, -100);
    }

    #[test]
    fn matches_phrases_attributes() {
        let doc = Html::parse_document(r#"<a aria-label="Siguiente" href="/2"><img></a>"#);
        let sel = Selector::parse("a").unwrap();
        let el = doc.select(&sel).next().unwrap();
        assert!(matches_phrases(&el, Direction::Next));
        assert!(!matches_phrases(&el, Direction::Previous));
    }

    #[test]
    fn custom_weights_apply() {
        let doc = Html::parse_document(r#"<nav><a href="/2">Next</a></nav>"#);
        let sel = Selector::parse("a").unwrap();
        let el = doc.select(&sel).next().unwrap();
        let weights = NavScoringWeights {
            landmark_bonus: 7,
            text_match_scale: 0,
            ..Default::default()
        };
        assert_eq!(score_element(&el, Direction::Next, &weights).total(), 7);
    }

    #[test]
    fn config_overrides_only_set_fields() {
        let config = NavConfig {
            sidebar_penalty: Some(900),
            large_list_threshold: Some(25),
            ..Default::default()
        };
        let weights = NavScoringWeights::default().with_overrides(&config);
        assert_eq!(weights.sidebar_penalty, 900);
        assert_eq!(weights.large_list_threshold, 25);
        assert_eq!(weights.rel_bonus, 1000);
    }
}
