//! Detail enrichment: replace short listing-page descriptions with fuller,
//! cleaned ones from each offer's own page.
//!
//! The loop is a fold over the first [`ENRICH_MAX_OFFERS`] offers that
//! accumulates an enriched-description map and a per-offer error list and
//! never short-circuits: one broken detail page must not cost the other
//! fourteen. The session stays open throughout — teardown is the run
//! controller's job.

use std::collections::HashMap;
use tracing::{info, warn};

use super::describe;
use super::site::SiteProfile;
use crate::browser::PageDriver;
use crate::core::types::ScrapedOffer;
use crate::llm::cleanup::cleanup_description;
use crate::llm::LanguageModel;

/// Detail pages visited per run. Trades completeness for run duration.
pub const ENRICH_MAX_OFFERS: usize = 15;

/// Raw text below this is too thin to be worth a cleanup call.
pub const MIN_RAW_CHARS: usize = 100;

/// A cleaned reply below this is treated as a failed cleanup.
pub const MIN_CLEANED_CHARS: usize = 100;

/// Cap applied to raw text when it is used as the fallback description.
pub const RAW_FALLBACK_MAX_CHARS: usize = 2_000;

/// A description obtained for one offer, with provenance: `cleaned` marks a
/// successful cleanup-model pass, which is allowed to shrink the text.
#[derive(Debug, Clone)]
pub struct EnrichedDescription {
    pub text: String,
    pub cleaned: bool,
}

/// Fold result: both lists are surfaced to the caller even though only
/// counts usually reach the user.
#[derive(Debug, Default)]
pub struct EnrichOutcome {
    /// Keyed by offer URL.
    pub descriptions: HashMap<String, EnrichedDescription>,
    /// (offer URL, error message) for every failed attempt.
    pub errors: Vec<(String, String)>,
}

/// Visit up to [`ENRICH_MAX_OFFERS`] detail pages over the still-open
/// authenticated session, pacing visits with the site's detail pause.
pub async fn enrich_offers<D: PageDriver + ?Sized>(
    driver: &D,
    llm: &dyn LanguageModel,
    site: &SiteProfile,
    offers: &[ScrapedOffer],
) -> EnrichOutcome {
    let mut outcome = EnrichOutcome::default();

    for (index, offer) in offers.iter().take(ENRICH_MAX_OFFERS).enumerate() {
        match enrich_one(driver, llm, site, offer, &mut outcome.errors).await {
            Ok(Some(desc)) => {
                info!(
                    "enrich: {}/{} got {} chars ({}) for {}",
                    index + 1,
                    offers.len().min(ENRICH_MAX_OFFERS),
                    desc.text.len(),
                    if desc.cleaned { "cleaned" } else { "raw fallback" },
                    offer.url
                );
                outcome.descriptions.insert(offer.url.clone(), desc);
            }
            Ok(None) => {
                info!("enrich: no usable description on {}", offer.url);
            }
            Err(e) => {
                warn!("enrich: {} failed, continuing: {}", offer.url, e);
                outcome.errors.push((offer.url.clone(), e.to_string()));
            }
        }

        tokio::time::sleep(site.detail_pause).await;
    }

    outcome
}

async fn enrich_one<D: PageDriver + ?Sized>(
    driver: &D,
    llm: &dyn LanguageModel,
    site: &SiteProfile,
    offer: &ScrapedOffer,
    errors: &mut Vec<(String, String)>,
) -> anyhow::Result<Option<EnrichedDescription>> {
    driver.navigate(&offer.url).await?;
    let html = driver.page_html().await?;

    let Some(raw) = describe::best_description(&html, &site.base_url) else {
        return Ok(None);
    };
    if raw.chars().count() < MIN_RAW_CHARS {
        return Ok(None);
    }

    // Cleanup errors and too-short replies both fall back to the truncated
    // raw text: data already in hand is never dropped over a cleanup call.
    match cleanup_description(llm, &raw).await {
        Ok(text) if text.chars().count() >= MIN_CLEANED_CHARS => {
            return Ok(Some(EnrichedDescription {
                text,
                cleaned: true,
            }));
        }
        Ok(text) => {
            warn!(
                "enrich: cleanup returned {} chars (< {}), using raw fallback for {}",
                text.chars().count(),
                MIN_CLEANED_CHARS,
                offer.url
            );
        }
        Err(e) => {
            warn!("enrich: cleanup call failed for {}: {}", offer.url, e);
            errors.push((offer.url.clone(), format!("cleanup failed: {}", e)));
        }
    }

    Ok(Some(EnrichedDescription {
        text: truncate_chars(&raw, RAW_FALLBACK_MAX_CHARS),
        cleaned: false,
    }))
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
