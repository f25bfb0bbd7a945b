use std::sync::Arc;

use crate::browser::SessionManager;
use crate::core::config::{load_scout_config, ScoutConfig};
use crate::llm::{LanguageModel, OpenAiCompatClient};
use crate::store::{MemoryStore, OfferStore, ProfileStore, RunStatusStore};

/// Shared daemon state: one HTTP client, one session registry, one LLM
/// client and the collaborator-store handles.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub sessions: Arc<SessionManager>,
    pub llm: Arc<dyn LanguageModel>,
    pub profiles: Arc<dyn ProfileStore>,
    pub offers: Arc<dyn OfferStore>,
    pub statuses: Arc<dyn RunStatusStore>,
    /// File-based config loaded from `offer-scout.json` (env-var fallback for all fields).
    pub config: Arc<ScoutConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("llm_configured", &self.llm.credential_configured())
            .finish()
    }
}

impl AppState {
    /// Default wiring: config from disk/env, chromiumoxide sessions, the
    /// OpenAI-compatible LLM client and the in-memory collaborator store.
    pub fn new(http_client: reqwest::Client) -> Self {
        let config = Arc::new(load_scout_config());
        let store = Arc::new(MemoryStore::new());
        Self {
            llm: Arc::new(OpenAiCompatClient::from_settings(
                http_client.clone(),
                &config.llm,
            )),
            sessions: SessionManager::new(),
            profiles: Arc::clone(&store) as Arc<dyn ProfileStore>,
            offers: Arc::clone(&store) as Arc<dyn OfferStore>,
            statuses: store as Arc<dyn RunStatusStore>,
            http_client,
            config,
        }
    }

    pub fn with_profile_store(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_offer_store(mut self, offers: Arc<dyn OfferStore>) -> Self {
        self.offers = offers;
        self
    }

    pub fn with_status_store(mut self, statuses: Arc<dyn RunStatusStore>) -> Self {
        self.statuses = statuses;
        self
    }
}
