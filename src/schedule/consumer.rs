//! Run consumer: reacts to one trigger event per user.
//!
//! Loads the user's stored credentials and active criteria, invokes the run
//! controller once per criteria set and upserts the results. Per-user
//! concurrency is exactly one: a second trigger for a user whose run is
//! still in flight queues on that user's lock rather than opening a second
//! browser session against the same account. Different users proceed fully
//! in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use super::trigger::TriggerEvent;
use crate::browser::BrowserSessions;
use crate::core::types::UserId;
use crate::llm::LanguageModel;
use crate::runner::run_search;
use crate::store::{OfferStore, ProfileStore, RunStatusStore};

/// Per-user mutual exclusion registry. Limit 1 by construction: every run
/// for a user goes through the same `Arc<Mutex<()>>`.
#[derive(Default)]
struct UserLocks {
    inner: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    async fn for_user(&self, user: &UserId) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().await;
        Arc::clone(locks.entry(user.clone()).or_default())
    }
}

/// What one event handling amounted to, for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerOutcome {
    /// Credentials or criteria missing — nothing to do, not an error.
    Skipped { reason: String },
    Completed {
        runs: usize,
        offers_upserted: usize,
        /// URLs whose write-back upsert failed. The batch never aborts over
        /// these; they are carried for observability.
        upsert_failures: Vec<String>,
        run_errors: usize,
    },
}

pub struct RunConsumer<S> {
    sessions: S,
    llm: Arc<dyn LanguageModel>,
    profiles: Arc<dyn ProfileStore>,
    offers: Arc<dyn OfferStore>,
    statuses: Arc<dyn RunStatusStore>,
    locks: UserLocks,
}

impl<S: BrowserSessions + 'static> RunConsumer<S> {
    pub fn new(
        sessions: S,
        llm: Arc<dyn LanguageModel>,
        profiles: Arc<dyn ProfileStore>,
        offers: Arc<dyn OfferStore>,
        statuses: Arc<dyn RunStatusStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            llm,
            profiles,
            offers,
            statuses,
            locks: UserLocks::default(),
        })
    }

    /// Drain the trigger channel, spawning one task per event. Same-user
    /// events serialize on the user lock inside [`Self::handle`].
    pub async fn run_loop(self: Arc<Self>, mut events: mpsc::Receiver<TriggerEvent>) {
        while let Some(event) = events.recv().await {
            let consumer = Arc::clone(&self);
            tokio::spawn(async move {
                let outcome = consumer.handle(event.clone()).await;
                info!("consumer: '{}' → {:?}", event.user_id, outcome);
            });
        }
    }

    /// Handle one trigger event. Duplicate delivery is harmless: runs for
    /// the same user serialize here, and the write-back upsert is idempotent.
    pub async fn handle(&self, event: TriggerEvent) -> ConsumerOutcome {
        let lock = self.locks.for_user(&event.user_id).await;
        let _guard = lock.lock().await;
        self.run_for_user(&event.user_id).await
    }

    async fn run_for_user(&self, user: &UserId) -> ConsumerOutcome {
        let credentials = match self.profiles.credentials(user).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                return ConsumerOutcome::Skipped {
                    reason: "no stored credentials".into(),
                }
            }
            Err(e) => {
                return ConsumerOutcome::Skipped {
                    reason: format!("credential lookup failed: {}", e),
                }
            }
        };

        let criteria_sets = match self.profiles.active_criteria(user).await {
            Ok(sets) if !sets.is_empty() => sets,
            Ok(_) => {
                return ConsumerOutcome::Skipped {
                    reason: "no active search criteria".into(),
                }
            }
            Err(e) => {
                return ConsumerOutcome::Skipped {
                    reason: format!("criteria lookup failed: {}", e),
                }
            }
        };

        let mut runs = 0usize;
        let mut offers_upserted = 0usize;
        let mut upsert_failures: Vec<String> = Vec::new();
        let mut run_errors = 0usize;

        for mut criteria in criteria_sets {
            criteria.credentials = credentials.clone();

            let label = format!("\"{}\" in {}", criteria.query, criteria.location);
            let status_id = match self.statuses.create_pending(user, &label).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("consumer: could not create run status for '{}': {}", user, e);
                    None
                }
            };

            runs += 1;
            match run_search(&self.sessions, self.llm.as_ref(), user, &criteria).await {
                Ok(report) => {
                    for offer in &report.offers {
                        match self.offers.upsert(user, offer).await {
                            Ok(_) => offers_upserted += 1,
                            Err(e) => {
                                // One bad row never aborts the batch.
                                warn!("consumer: upsert failed for {}: {}", offer.url, e);
                                upsert_failures.push(offer.url.clone());
                            }
                        }
                    }
                    if let Some(id) = status_id {
                        if let Err(e) = self.statuses.mark_success(id, report.summary()).await {
                            warn!("consumer: status update failed: {}", e);
                        }
                    }
                }
                Err(e) => {
                    warn!("consumer: run for '{}' ({}) failed: {}", user, label, e);
                    run_errors += 1;
                    if let Some(id) = status_id {
                        if let Err(e2) = self.statuses.mark_error(id, &e.to_string()).await {
                            warn!("consumer: status update failed: {}", e2);
                        }
                    }
                }
            }
        }

        ConsumerOutcome::Completed {
            runs,
            offers_upserted,
            upsert_failures,
            run_errors,
        }
    }
}
