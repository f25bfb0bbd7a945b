//! Three-tier job-description extraction from a rendered detail page.
//!
//! Structural class names on the target sites change frequently, so a
//! selector-only approach rots fast. The cascade degrades gracefully:
//!
//! 1. Semantic selectors — class/id names carrying "description"-like
//!    keywords, first match over [`MIN_DESCRIPTION_CHARS`] wins.
//! 2. Density ranking — every block element outside page chrome scored by
//!    text length against child count; the densest block over the minimum
//!    wins. Resilient to class-name churn.
//! 3. Readability main-content extraction, then whole-page text.
//!
//! Pure over a serialized DOM: no browser needed, fixture-testable.

use readability::extractor;
use scraper::{Html, Selector};
use select::{
    document::Document as SelectDoc,
    node::Node,
    predicate::{Name, Predicate},
};
use url::Url;

/// A candidate block must carry at least this much text to be accepted by
/// tiers 1 and 2.
pub const MIN_DESCRIPTION_CHARS: usize = 200;

/// Tier-1 selector cascade, most specific first.
const SEMANTIC_SELECTORS: &[&str] = &[
    "[class*='jobs-description']",
    "[class*='job-description']",
    "[id*='job-description']",
    "[class*='job-detail']",
    "[id*='job-detail']",
    "[class*='job-content']",
    "[class*='description']",
    "[id*='description']",
];

/// Page-chrome containers whose text never belongs in a description.
const CHROME_CONTAINERS: &[&str] = &["nav", "header", "footer", "aside"];

/// Best description candidate for a rendered detail page, or `None` when the
/// page carries no usable text at all.
pub fn best_description(html: &str, base_url: &str) -> Option<String> {
    if let Some(text) = semantic_selector_pass(html) {
        return Some(text);
    }
    if let Some(text) = density_pass(html) {
        return Some(text);
    }
    fallback_pass(html, base_url)
}

// ── Tier 1: semantic selectors ───────────────────────────────────────────────

fn semantic_selector_pass(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for raw in SEMANTIC_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            if text.chars().count() > MIN_DESCRIPTION_CHARS {
                return Some(text);
            }
        }
    }
    None
}

// ── Tier 2: density ranking ──────────────────────────────────────────────────

fn density_pass(html: &str) -> Option<String> {
    let doc = SelectDoc::from(html);
    let mut best: Option<(f64, String)> = None;

    for node in doc.find(Name("div").or(Name("section")).or(Name("article"))) {
        if inside_chrome(&node) {
            continue;
        }
        let text = collapse_whitespace(&node.text());
        let len = text.chars().count();
        if len <= MIN_DESCRIPTION_CHARS {
            continue;
        }
        let child_count = node.children().filter(|c| c.name().is_some()).count();
        let score = len as f64 / (1.0 + child_count as f64);
        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, text));
        }
    }

    best.map(|(_, text)| text)
}

fn inside_chrome(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if let Some(name) = parent.name() {
            if CHROME_CONTAINERS.contains(&name) {
                return true;
            }
        }
        current = parent.parent();
    }
    false
}

// ── Tier 3: readability / whole-page fallback ────────────────────────────────

fn fallback_pass(html: &str, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url)
        .or_else(|_| Url::parse("https://localhost/"))
        .ok()?;

    if let Ok(product) = extractor::extract(&mut html.as_bytes(), &base) {
        let text = collapse_whitespace(&product.text);
        if !text.is_empty() {
            return Some(text);
        }
    }

    let whole = collapse_whitespace(&html2md::parse_html(html));
    if whole.is_empty() {
        None
    } else {
        Some(whole)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
