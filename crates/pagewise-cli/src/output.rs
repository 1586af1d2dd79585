use std::io::Write;

use owo_colors::OwoColorize;
use pagewise_core::CleanDocument;
use pagewise_nav::{NavCandidate, NavLinks};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn link_or_none(link: &str) -> &str {
    if link.is_empty() { "(none)" } else { link }
}

fn write_label(
    w: &mut dyn Write,
    label: &str,
    value: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", format!("{label:<6}").bold(), value)
    } else {
        writeln!(w, "{label:<6} {value}")
    }
}

/// Print an assembled document: header lines, then the content HTML.
pub fn print_document(
    w: &mut dyn Write,
    doc: &CleanDocument,
    color: ColorMode,
) -> std::io::Result<()> {
    let title = if doc.title.is_empty() {
        "(no article found)"
    } else {
        doc.title.as_str()
    };
    write_label(w, "Title:", title, color)?;
    write_label(w, "Next:", link_or_none(&doc.nav_next), color)?;
    write_label(w, "Prev:", link_or_none(&doc.nav_prev), color)?;
    writeln!(w)?;
    if !doc.content_html.is_empty() {
        writeln!(w, "{}", doc.content_html)?;
    }
    Ok(())
}

pub fn print_nav(w: &mut dyn Write, links: &NavLinks, color: ColorMode) -> std::io::Result<()> {
    write_label(w, "Next:", link_or_none(&links.next), color)?;
    write_label(w, "Prev:", link_or_none(&links.prev), color)
}

/// One line per candidate with its score breakdown. Winners are marked with `*`.
pub fn print_candidates(
    w: &mut dyn Write,
    candidates: &[NavCandidate],
    links: &NavLinks,
    color: ColorMode,
) -> std::io::Result<()> {
    if candidates.is_empty() {
        return writeln!(w, "No navigation candidates found.");
    }

    for c in candidates {
        let winner = match c.direction {
            pagewise_nav::Direction::Next => c.resolved_url == links.next,
            pagewise_nav::Direction::Previous => c.resolved_url == links.prev,
        };
        let marker = if winner { "*" } else { " " };
        let b = &c.breakdown;
        let detail = format!(
            "rel={} landmark={} class={} text={} attr={} sidebar={} list={}",
            b.rel, b.landmark, b.nav_class, b.text_match, b.attribute_match, b.sidebar, b.large_list
        );
        let head = format!(
            "{marker} #{:<3} {:<8} {:>5}",
            c.discovery_order,
            c.direction.as_str(),
            c.score
        );

        if color.enabled() && winner {
            writeln!(w, "{} {}", head.green().bold(), c.resolved_url)?;
        } else {
            writeln!(w, "{head} {}", c.resolved_url)?;
        }
        if color.enabled() {
            writeln!(w, "        {}", detail.dimmed())?;
        } else {
            writeln!(w, "        {detail}")?;
        }
    }
    Ok(())
}
