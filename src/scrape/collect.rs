//! Paginated collection over the site's offset-paginated results URL.
//!
//! Navigates up to [`MAX_PAGES`] result pages, scrolling to force
//! lazy-loaded cards before capturing a snapshot, and stops early on three
//! heuristics: a block-page interstitial, a near-empty snapshot, or a page
//! past the first contributing no new links.
//!
//! The browser session is deliberately NOT closed here — the enrichment
//! stage reuses the open, authenticated session so a run logs in exactly
//! once. Teardown belongs to the run controller.

use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};

use super::site::SiteProfile;
use crate::browser::PageDriver;
use crate::core::types::{PageLink, SearchCriteria};

/// Upper bound on result pages fetched per run.
pub const MAX_PAGES: u32 = 3;

/// A snapshot shorter than this means the page rendered no results.
pub const EMPTY_SNAPSHOT_THRESHOLD: usize = 500;

const SCROLLS_PER_PAGE: usize = 3;
const SCROLL_STEP_PX: i64 = 800;

#[derive(Debug, Error)]
pub enum CollectError {
    /// The very first results page was an anti-automation interstitial, so
    /// the whole query is unreachable.
    #[error("search results blocked before any page was collected (landed on {0})")]
    BlockedAtEntry(String),

    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}

/// Everything the extraction stage needs from the results pages.
#[derive(Debug, Clone, Default)]
pub struct CollectOutcome {
    /// Per-page snapshots concatenated with page-boundary markers.
    pub snapshot: String,
    /// Deduplicated result links, in discovery order.
    pub links: Vec<PageLink>,
    pub pages_collected: usize,
}

impl CollectOutcome {
    pub fn is_empty(&self) -> bool {
        self.snapshot.trim().is_empty()
    }
}

/// Collect up to [`MAX_PAGES`] result pages for one criteria set over a live
/// authenticated session.
pub async fn collect_pages<D: PageDriver + ?Sized>(
    driver: &D,
    site: &SiteProfile,
    criteria: &SearchCriteria,
) -> Result<CollectOutcome, CollectError> {
    let mut snapshots: Vec<String> = Vec::new();
    let mut links: Vec<PageLink> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut pages_collected = 0usize;

    for page_index in 0..MAX_PAGES {
        let url = site.search_url(criteria, page_index * site.results_per_page);
        info!("collect: page {} → {}", page_index, url);
        driver.navigate(&url).await?;

        let current = driver.current_url().await?;
        if site.is_block_url(&current) {
            if page_index == 0 {
                return Err(CollectError::BlockedAtEntry(current));
            }
            // A later block just ends pagination; what we already collected
            // stays valid.
            warn!(
                "collect: block page at index {} ({}), keeping {} collected pages",
                page_index, current, pages_collected
            );
            break;
        }

        for _ in 0..SCROLLS_PER_PAGE {
            if let Err(e) = driver.scroll_by(SCROLL_STEP_PX).await {
                warn!("collect: scroll error (non-fatal): {}", e);
            }
            tokio::time::sleep(site.scroll_pause).await;
        }

        let snapshot = driver.snapshot().await?;
        if snapshot.chars().count() < EMPTY_SNAPSHOT_THRESHOLD {
            info!(
                "collect: page {} snapshot below {} chars — no more results",
                page_index, EMPTY_SNAPSHOT_THRESHOLD
            );
            break;
        }

        let page_links = driver.extract_links(&site.link_selectors).await?;
        let fresh: Vec<PageLink> = page_links
            .into_iter()
            .filter(|l| !l.url.is_empty() && seen.insert(l.url.clone()))
            .collect();
        if page_index > 0 && fresh.is_empty() {
            info!("collect: page {} contributed no new links — stopping", page_index);
            break;
        }

        info!(
            "collect: page {} captured ({} chars, {} new links)",
            page_index,
            snapshot.len(),
            fresh.len()
        );
        snapshots.push(format!("--- PAGE {} ---\n{}", page_index + 1, snapshot));
        links.extend(fresh);
        pages_collected += 1;
    }

    Ok(CollectOutcome {
        snapshot: snapshots.join("\n\n"),
        links,
        pages_collected,
    })
}
