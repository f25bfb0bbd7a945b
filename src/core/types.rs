use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque user identifier, owned by the external profile store.
pub type UserId = String;

// ── Run input ────────────────────────────────────────────────────────────────

/// Login secrets for the target site. `Debug` redacts the secret so criteria
/// can be logged at any level without leaking credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct SiteCredentials {
    pub username: String,
    pub secret: String,
}

impl std::fmt::Debug for SiteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteCredentials")
            .field("username", &self.username)
            .field("secret", &"***")
            .finish()
    }
}

/// One search request, immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub query: String,
    pub location: String,
    /// Target site identifiers. Currently exactly one per criteria set.
    pub sites: Vec<String>,
    #[serde(default)]
    pub contract_types: Vec<String>,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub min_salary: Option<u32>,
    #[serde(default)]
    pub excluded_keywords: Vec<String>,
    pub credentials: SiteCredentials,
}

impl SearchCriteria {
    /// The single target site of this criteria set.
    pub fn primary_site(&self) -> Option<&str> {
        self.sites.first().map(|s| s.as_str())
    }
}

// ── Run output ───────────────────────────────────────────────────────────────

/// A structured job offer as produced by the extraction service and
/// (optionally) enriched with a fuller description from its detail page.
///
/// Invariant: `title` and `url` are non-empty — entries violating this are
/// filtered out before an offer is ever handed to a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedOffer {
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub description: String,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    /// Site identifier this offer was discovered on.
    pub source: String,
}

/// A raw anchor captured from a results page before extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageLink {
    pub url: String,
    pub text: String,
}

// ── Scheduling ───────────────────────────────────────────────────────────────

/// Per-user scheduling configuration, read from the external store and never
/// mutated here. `timezone` is an IANA name; invalid names fall back to UTC
/// at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub user_id: UserId,
    pub active: bool,
    pub hour: u32,
    pub minute: u32,
    pub timezone: String,
    #[serde(default)]
    pub search_config_id: Option<uuid::Uuid>,
}

// ── Status reporting ─────────────────────────────────────────────────────────

/// Small machine-readable summary attached to a successful run status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub offers_found: usize,
    pub offers_enriched: usize,
    pub pages_collected: usize,
}

/// Lifecycle of one scheduled or interactive run, surfaced to the external
/// status collaborator. Pending is written before the run starts and receives
/// exactly one terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Success { summary: RunSummary },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub id: uuid::Uuid,
    pub user_id: UserId,
    pub label: String,
    pub state: RunState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}
