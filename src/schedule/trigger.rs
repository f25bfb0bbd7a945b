//! Trigger evaluation: a fixed cadence loop that turns per-user schedule
//! configs into events.
//!
//! Matching is a pure function over (now, configs) so the timezone logic is
//! testable without a clock or a store. Precision is ±1 cadence tick; the
//! default tick of 60 s gives minute precision.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::types::{ScheduleConfig, UserId};
use crate::store::ProfileStore;

/// One scheduling event: only a user identifier. Consumers must tolerate
/// duplicate delivery — the per-user upsert semantics already do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub user_id: UserId,
}

/// Users whose configured local time matches `now` exactly.
///
/// Each config's IANA timezone converts `now`; an invalid timezone string
/// falls back to UTC rather than dropping the config. At most one entry per
/// user, however many of their configs match.
pub fn due_user_ids(now: DateTime<Utc>, configs: &[ScheduleConfig]) -> Vec<UserId> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut due = Vec::new();

    for config in configs.iter().filter(|c| c.active) {
        let tz: Tz = config.timezone.parse().unwrap_or_else(|_| {
            warn!(
                "schedule for '{}' has invalid timezone '{}', falling back to UTC",
                config.user_id, config.timezone
            );
            Tz::UTC
        });
        let local = now.with_timezone(&tz);
        if local.hour() == config.hour && local.minute() == config.minute {
            if seen.insert(config.user_id.as_str()) {
                due.push(config.user_id.clone());
            }
        }
    }

    due
}

/// Spawn the evaluator loop: every `tick`, load active schedules and emit
/// one [`TriggerEvent`] per matching user. The loop ends when the receiving
/// side is dropped.
pub fn spawn_trigger_loop(
    profiles: Arc<dyn ProfileStore>,
    tick: Duration,
) -> mpsc::Receiver<TriggerEvent> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let configs = match profiles.active_schedules().await {
                Ok(configs) => configs,
                Err(e) => {
                    warn!("trigger loop: failed to load schedules: {}", e);
                    continue;
                }
            };
            for user_id in due_user_ids(Utc::now(), &configs) {
                info!("trigger: schedule due for '{}'", user_id);
                if tx.send(TriggerEvent { user_id }).await.is_err() {
                    return; // consumer gone — stop evaluating
                }
            }
        }
    });

    rx
}
