pub mod browser;
pub mod core;
pub mod llm;
pub mod runner;
pub mod schedule;
pub mod scrape;
pub mod store;

// --- Primary exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;

pub use browser::{BrowserSessions, PageDriver, SessionManager};
pub use llm::{LanguageModel, ModelTier};
pub use runner::{run_search, RunError, RunReport};
pub use schedule::{due_user_ids, spawn_trigger_loop, RunConsumer, TriggerEvent};
pub use scrape::{LoginOutcome, SiteProfile};
