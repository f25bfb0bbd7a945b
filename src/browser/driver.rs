//! Seams between the pipeline stages and the live browser.
//!
//! The collection, authentication and enrichment stages only ever talk to a
//! [`PageDriver`]; the run controller only ever talks to a
//! [`BrowserSessions`]. Production wires both to the chromiumoxide-backed
//! [`super::session::SessionManager`]; the test suite wires scripted fakes.

use crate::core::types::PageLink;
use anyhow::Result;
use async_trait::async_trait;

/// Page-level primitives of one named browser session.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load a URL and wait for DOM readiness plus a client-render settle.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// The page's current URL, after any redirects.
    async fn current_url(&self) -> Result<String>;

    /// Type a value into the first element matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Scroll the page down by `pixels`.
    async fn scroll_by(&self, pixels: i64) -> Result<()>;

    /// Compact accessibility-like text rendering of the page, capped at
    /// [`super::session::SNAPSHOT_MAX_CHARS`].
    async fn snapshot(&self) -> Result<String>;

    /// Collect anchors using an ordered selector cascade: each selector is
    /// tried in turn and the first one yielding at least one link wins.
    async fn extract_links(&self, selectors: &[String]) -> Result<Vec<PageLink>>;

    /// The page's full rendered markup.
    async fn page_html(&self) -> Result<String>;
}

/// Session lifecycle owned by the run controller.
#[async_trait]
pub trait BrowserSessions: Send + Sync {
    type Driver: PageDriver;

    /// Create a fresh session under `name`, replacing any prior session with
    /// the same name.
    async fn launch(&self, name: &str) -> Result<Self::Driver>;

    /// Release the session. Idempotent: closing an unknown or already-closed
    /// session is a no-op and never errors.
    async fn close(&self, name: &str);

    /// Number of currently open sessions. Zero after every completed run.
    async fn open_count(&self) -> usize;
}
