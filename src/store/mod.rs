//! Collaborator boundaries for the external profile, offer and run-status
//! stores.
//!
//! The dashboard, CRUD API and persistent database live outside this crate;
//! the pipeline only ever sees these traits. [`MemoryStore`] implements all
//! three over mutex-guarded maps — it is the default wiring for the daemon
//! and the substrate the test suite runs on.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::types::{
    RunState, RunStatus, RunSummary, ScheduleConfig, ScrapedOffer, SearchCriteria,
    SiteCredentials, UserId,
};

/// A persisted offer row. `origin` records how the offer was first
/// discovered and is never overwritten by later upserts.
#[derive(Debug, Clone)]
pub struct StoredOffer {
    pub offer: ScrapedOffer,
    pub origin: String,
    pub is_new: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

// ── Traits ───────────────────────────────────────────────────────────────────

/// Read side of the external profile / search-configuration store.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn active_schedules(&self) -> Result<Vec<ScheduleConfig>>;
    async fn credentials(&self, user: &UserId) -> Result<Option<SiteCredentials>>;
    async fn active_criteria(&self, user: &UserId) -> Result<Vec<SearchCriteria>>;
}

/// Write-back collaborator. Upserts are keyed by (user, url): duplicate
/// delivery of the same offer is harmless by construction.
#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn upsert(&self, user: &UserId, offer: &ScrapedOffer) -> Result<UpsertOutcome>;
    async fn offers_for(&self, user: &UserId) -> Result<Vec<StoredOffer>>;
}

/// Status-reporting boundary: one pending row per run, exactly one terminal
/// transition.
#[async_trait]
pub trait RunStatusStore: Send + Sync {
    async fn create_pending(&self, user: &UserId, label: &str) -> Result<Uuid>;
    async fn mark_success(&self, id: Uuid, summary: RunSummary) -> Result<()>;
    async fn mark_error(&self, id: Uuid, message: &str) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<RunStatus>>;
}

// ── In-memory implementation ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    schedules: Mutex<Vec<ScheduleConfig>>,
    credentials: Mutex<HashMap<UserId, SiteCredentials>>,
    criteria: Mutex<HashMap<UserId, Vec<SearchCriteria>>>,
    offers: Mutex<HashMap<(UserId, String), StoredOffer>>,
    statuses: Mutex<HashMap<Uuid, RunStatus>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_schedule(&self, config: ScheduleConfig) {
        self.schedules.lock().await.push(config);
    }

    pub async fn seed_credentials(&self, user: &UserId, credentials: SiteCredentials) {
        self.credentials
            .lock()
            .await
            .insert(user.clone(), credentials);
    }

    pub async fn seed_criteria(&self, user: &UserId, criteria: Vec<SearchCriteria>) {
        self.criteria.lock().await.insert(user.clone(), criteria);
    }

    /// All run statuses recorded for a user, oldest first.
    pub async fn statuses_for(&self, user: &UserId) -> Vec<RunStatus> {
        let mut rows: Vec<RunStatus> = self
            .statuses
            .lock()
            .await
            .values()
            .filter(|s| &s.user_id == user)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.created_at);
        rows
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn active_schedules(&self) -> Result<Vec<ScheduleConfig>> {
        Ok(self
            .schedules
            .lock()
            .await
            .iter()
            .filter(|c| c.active)
            .cloned()
            .collect())
    }

    async fn credentials(&self, user: &UserId) -> Result<Option<SiteCredentials>> {
        Ok(self.credentials.lock().await.get(user).cloned())
    }

    async fn active_criteria(&self, user: &UserId) -> Result<Vec<SearchCriteria>> {
        Ok(self
            .criteria
            .lock()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl OfferStore for MemoryStore {
    async fn upsert(&self, user: &UserId, offer: &ScrapedOffer) -> Result<UpsertOutcome> {
        let mut offers = self.offers.lock().await;
        let key = (user.clone(), offer.url.clone());
        let now = Utc::now();

        match offers.get_mut(&key) {
            Some(existing) => {
                // Refresh mutable fields; the discovery origin and first-seen
                // timestamp survive every later sighting.
                existing.offer = offer.clone();
                existing.is_new = false;
                existing.last_seen = now;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                offers.insert(
                    key,
                    StoredOffer {
                        offer: offer.clone(),
                        origin: offer.source.clone(),
                        is_new: true,
                        first_seen: now,
                        last_seen: now,
                    },
                );
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn offers_for(&self, user: &UserId) -> Result<Vec<StoredOffer>> {
        Ok(self
            .offers
            .lock()
            .await
            .iter()
            .filter(|((u, _), _)| u == user)
            .map(|(_, row)| row.clone())
            .collect())
    }
}

#[async_trait]
impl RunStatusStore for MemoryStore {
    async fn create_pending(&self, user: &UserId, label: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.statuses.lock().await.insert(
            id,
            RunStatus {
                id,
                user_id: user.clone(),
                label: label.to_string(),
                state: RunState::Pending,
                created_at: Utc::now(),
                finished_at: None,
            },
        );
        Ok(id)
    }

    async fn mark_success(&self, id: Uuid, summary: RunSummary) -> Result<()> {
        let mut statuses = self.statuses.lock().await;
        if let Some(status) = statuses.get_mut(&id) {
            status.state = RunState::Success { summary };
            status.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<()> {
        let mut statuses = self.statuses.lock().await;
        if let Some(status) = statuses.get_mut(&id) {
            status.state = RunState::Error {
                message: message.to_string(),
            };
            status.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<RunStatus>> {
        Ok(self.statuses.lock().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(url: &str, source: &str) -> ScrapedOffer {
        ScrapedOffer {
            title: "Rust Engineer".into(),
            company: "Acme".into(),
            location: "Paris".into(),
            url: url.into(),
            description: "short".into(),
            salary: None,
            contract_type: None,
            source: source.into(),
        }
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_row_and_original_origin() {
        let store = MemoryStore::new();
        let user: UserId = "u1".into();

        let first = offer("https://x/1", "linkedin");
        assert_eq!(
            store.upsert(&user, &first).await.unwrap(),
            UpsertOutcome::Inserted
        );

        // Same URL rediscovered later with a different source tag: the row
        // must keep how it was first found.
        let mut again = offer("https://x/1", "manual-import");
        again.description = "much longer refreshed description".into();
        assert_eq!(
            store.upsert(&user, &again).await.unwrap(),
            UpsertOutcome::Updated
        );

        let rows = store.offers_for(&user).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].origin, "linkedin");
        assert!(!rows[0].is_new);
        assert_eq!(rows[0].offer.description, "much longer refreshed description");
        assert!(rows[0].first_seen <= rows[0].last_seen);
    }

    #[tokio::test]
    async fn rows_are_scoped_per_user() {
        let store = MemoryStore::new();
        let a: UserId = "a".into();
        let b: UserId = "b".into();
        store.upsert(&a, &offer("https://x/1", "linkedin")).await.unwrap();
        store.upsert(&b, &offer("https://x/1", "linkedin")).await.unwrap();
        assert_eq!(store.offers_for(&a).await.unwrap().len(), 1);
        assert_eq!(store.offers_for(&b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_status_transitions_once() {
        let store = MemoryStore::new();
        let user: UserId = "u1".into();
        let id = store.create_pending(&user, "daily scan").await.unwrap();

        let pending = store.get(id).await.unwrap().unwrap();
        assert_eq!(pending.state, RunState::Pending);
        assert!(pending.finished_at.is_none());

        store
            .mark_success(
                id,
                RunSummary {
                    offers_found: 3,
                    offers_enriched: 2,
                    pages_collected: 1,
                },
            )
            .await
            .unwrap();
        let done = store.get(id).await.unwrap().unwrap();
        assert!(matches!(done.state, RunState::Success { .. }));
        assert!(done.finished_at.is_some());
    }
}
