//! Run controller: one end-to-end login → collect → extract → enrich
//! sequence for a single criteria set.
//!
//! The controller owns the browser session lifecycle. Whatever happens in
//! the stages — clean result, empty result, typed error, browser failure —
//! the session is closed before anything propagates to the caller. A leaked
//! headless browser accumulates silently; this is the one invariant the
//! whole subsystem bends around.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::browser::{BrowserSessions, PageDriver};
use crate::core::types::{RunSummary, ScrapedOffer, SearchCriteria, UserId};
use crate::llm::extract::extract_offers;
use crate::llm::LanguageModel;
use crate::scrape::auth::{perform_login, LoginOutcome};
use crate::scrape::collect::{collect_pages, CollectError};
use crate::scrape::enrich::{enrich_offers, EnrichOutcome};
use crate::scrape::site::SiteProfile;

/// Client-facing error taxonomy. Every variant carries a message fit to
/// surface directly — callers never see a raw stack trace.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(
        "language-service credential is not configured — set OPENAI_API_KEY or the \
         llm.api_key field of offer-scout.json"
    )]
    MissingLlmCredential,

    #[error("unknown target site '{0}'")]
    UnknownSite(String),

    /// Two-factor / bot verification demanded. Not automatically retryable;
    /// the message tells the human how to clear it.
    #[error("login challenge: {message}")]
    LoginChallenge { message: String },

    #[error("login failed: {message}")]
    LoginFailed { message: String },

    #[error("search results blocked before any page was collected (landed on {0})")]
    Blocked(String),

    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}

impl From<CollectError> for RunError {
    fn from(e: CollectError) -> Self {
        match e {
            CollectError::BlockedAtEntry(url) => RunError::Blocked(url),
            CollectError::Browser(e) => RunError::Browser(e),
        }
    }
}

/// Result of one run: the final offer list plus the counts surfaced through
/// the status boundary.
#[derive(Debug, Default)]
pub struct RunReport {
    pub offers: Vec<ScrapedOffer>,
    pub pages_collected: usize,
    pub enriched_count: usize,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            offers_found: self.offers.len(),
            offers_enriched: self.enriched_count,
            pages_collected: self.pages_collected,
        }
    }
}

/// Execute one run for `criteria` on behalf of `user_id`.
///
/// Fails fast on configuration problems before any browser resource is
/// opened. Once a session exists, it is closed on every exit path.
pub async fn run_search<S: BrowserSessions>(
    sessions: &S,
    llm: &dyn LanguageModel,
    user_id: &UserId,
    criteria: &SearchCriteria,
) -> Result<RunReport, RunError> {
    // Nothing has been opened yet, so these checks need no cleanup.
    if !llm.credential_configured() {
        return Err(RunError::MissingLlmCredential);
    }
    let site_id = criteria
        .primary_site()
        .ok_or_else(|| RunError::UnknownSite("(none configured)".into()))?;
    let site =
        SiteProfile::for_id(site_id).ok_or_else(|| RunError::UnknownSite(site_id.to_string()))?;

    // Unique per run by construction: user, site and launch timestamp.
    let session_name = format!("{}-{}-{}", user_id, site.id, Utc::now().timestamp_millis());
    let driver = sessions.launch(&session_name).await?;

    // try/finally: the session outlives no exit path of the stages.
    let result = run_stages(&driver, llm, &site, criteria).await;
    sessions.close(&session_name).await;

    if let Ok(report) = &result {
        info!(
            "run '{}': {} offers, {} enriched, {} pages",
            session_name,
            report.offers.len(),
            report.enriched_count,
            report.pages_collected
        );
    }
    result
}

async fn run_stages<D: PageDriver>(
    driver: &D,
    llm: &dyn LanguageModel,
    site: &SiteProfile,
    criteria: &SearchCriteria,
) -> Result<RunReport, RunError> {
    match perform_login(driver, site, &criteria.credentials).await {
        LoginOutcome::Success => {}
        LoginOutcome::Challenge { message } => return Err(RunError::LoginChallenge { message }),
        LoginOutcome::Failure { message } => return Err(RunError::LoginFailed { message }),
    }

    let collected = collect_pages(driver, site, criteria).await?;
    if collected.is_empty() {
        info!("run: no usable snapshot collected — empty result");
        return Ok(RunReport::default());
    }

    let mut offers = extract_offers(llm, site, criteria, &collected).await;
    if offers.is_empty() {
        info!("run: extraction yielded zero offers — empty result");
        return Ok(RunReport {
            offers: Vec::new(),
            pages_collected: collected.pages_collected,
            enriched_count: 0,
        });
    }

    let enriched = enrich_offers(driver, llm, site, &offers).await;
    let enriched_count = merge_descriptions(&mut offers, &enriched);

    Ok(RunReport {
        offers,
        pages_collected: collected.pages_collected,
        enriched_count,
    })
}

/// Merge enriched descriptions back into the offer list by URL.
///
/// A successful cleanup may replace with a smaller-but-cleaner text; a raw
/// fallback only replaces when it is actually longer than what extraction
/// already produced. Offers whose URL was never enriched keep their listing
/// description untouched.
fn merge_descriptions(offers: &mut [ScrapedOffer], enriched: &EnrichOutcome) -> usize {
    let mut replaced = 0;
    for offer in offers.iter_mut() {
        if let Some(desc) = enriched.descriptions.get(&offer.url) {
            if desc.cleaned || desc.text.len() > offer.description.len() {
                offer.description = desc.text.clone();
                replaced += 1;
            }
        }
    }
    replaced
}
