//! Structured extraction: snapshot + links → typed offers.
//!
//! One extraction call per run. The prompt pins a strict JSON-array-only
//! output contract; the parser still defends against models that wrap the
//! array in prose. A failed or malformed reply degrades to zero offers —
//! extraction problems are never fatal to the run.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::warn;
use url::Url;

use super::client::{LanguageModel, ModelTier};
use crate::core::types::{ScrapedOffer, SearchCriteria};
use crate::scrape::collect::CollectOutcome;
use crate::scrape::site::SiteProfile;

/// Snapshot text fed to the model is truncated to this many characters.
pub const SNAPSHOT_PROMPT_MAX_CHARS: usize = 30_000;

/// Hard cap on links sent and offers returned.
pub const MAX_OFFERS: usize = 75;

static JSON_ARRAY: OnceLock<Regex> = OnceLock::new();

fn json_array_pattern() -> &'static Regex {
    JSON_ARRAY.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("valid JSON-array pattern"))
}

/// One entry of the model's JSON reply. Optional everywhere — filtering
/// happens after parse, not during.
#[derive(Debug, Deserialize)]
struct RawOffer {
    #[serde(default)]
    title: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    salary: Option<String>,
    #[serde(default)]
    contract_type: Option<String>,
}

/// Run the extraction call and parse its reply. Any service error or parse
/// failure yields an empty list.
pub async fn extract_offers(
    llm: &dyn LanguageModel,
    site: &SiteProfile,
    criteria: &SearchCriteria,
    collected: &CollectOutcome,
) -> Vec<ScrapedOffer> {
    let (system, user) = build_extraction_prompt(site, criteria, collected);
    match llm.complete(ModelTier::Extraction, &system, &user).await {
        Ok(reply) => parse_offers(&reply, site),
        Err(e) => {
            warn!("extraction call failed, treating as zero offers: {}", e);
            Vec::new()
        }
    }
}

/// Build the (system, user) prompt pair for the extraction call.
pub fn build_extraction_prompt(
    site: &SiteProfile,
    criteria: &SearchCriteria,
    collected: &CollectOutcome,
) -> (String, String) {
    let system = format!(
        "You turn job-board search result pages into structured data. \
         Respond with ONLY a JSON array (no prose, no markdown fences) of at most {max} objects, \
         each with keys: title, company, location, url, description, salary, contract_type. \
         Use null for unknown salary or contract_type. \
         Resolve relative URLs against {base}.",
        max = MAX_OFFERS,
        base = site.base_url
    );

    let snapshot = truncate_chars(&collected.snapshot, SNAPSHOT_PROMPT_MAX_CHARS);
    let links = collected
        .links
        .iter()
        .take(MAX_OFFERS)
        .map(|l| format!("- {} | {}", l.text, l.url))
        .collect::<Vec<_>>()
        .join("\n");

    let mut constraints = Vec::new();
    if !criteria.excluded_keywords.is_empty() {
        constraints.push(format!(
            "Skip any offer whose title or description mentions: {}.",
            criteria.excluded_keywords.join(", ")
        ));
    }
    if !criteria.contract_types.is_empty() {
        constraints.push(format!(
            "Prefer contract types: {}.",
            criteria.contract_types.join(", ")
        ));
    }
    if let Some(min) = criteria.min_salary {
        constraints.push(format!("Prefer offers paying at least {min}."));
    }

    let user = format!(
        "Search: \"{query}\" in \"{location}\".\n{constraints}\n\n\
         Candidate links:\n{links}\n\nPage snapshots:\n{snapshot}",
        query = criteria.query,
        location = criteria.location,
        constraints = constraints.join(" "),
        links = links,
        snapshot = snapshot,
    );

    (system, user)
}

/// Parse a model reply into validated offers.
///
/// Locates the first `[...]` span (models occasionally wrap the array in
/// prose despite instructions), parses it, drops entries without a title or
/// URL, resolves relative URLs against the site base, stamps the source and
/// truncates to [`MAX_OFFERS`].
pub fn parse_offers(reply: &str, site: &SiteProfile) -> Vec<ScrapedOffer> {
    let Some(m) = json_array_pattern().find(reply) else {
        warn!("extraction reply carried no JSON array");
        return Vec::new();
    };

    let raw: Vec<RawOffer> = match serde_json::from_str(m.as_str()) {
        Ok(v) => v,
        Err(e) => {
            warn!("extraction reply JSON parse failed: {}", e);
            return Vec::new();
        }
    };

    let base = Url::parse(&site.base_url).ok();
    raw.into_iter()
        .filter(|o| !o.title.trim().is_empty() && !o.url.trim().is_empty())
        .take(MAX_OFFERS)
        .map(|o| ScrapedOffer {
            url: resolve_url(&o.url, base.as_ref()),
            title: o.title,
            company: o.company,
            location: o.location,
            description: o.description,
            salary: o.salary,
            contract_type: o.contract_type,
            source: site.id.clone(),
        })
        .collect()
}

fn resolve_url(raw: &str, base: Option<&Url>) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }
    match base.and_then(|b| b.join(raw).ok()) {
        Some(joined) => joined.to_string(),
        None => raw.to_string(),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
