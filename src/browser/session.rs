//! Named browser session management using `chromiumoxide`.
//!
//! This module is the **single source of truth** for:
//! * Launching a headless browser + page per run, keyed by session name.
//! * The navigate/fill/click/wait/scroll/snapshot/extract primitives the
//!   pipeline stages drive the page with.
//! * Guaranteed idempotent teardown — `close` never errors, whatever state
//!   the session is in.
//!
//! One run owns exactly one session; names are composed from a run-scoped
//! identifier by the run controller, so two concurrent runs can never
//! collide on an entry.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::chrome;
use super::driver::{BrowserSessions, PageDriver};
use crate::core::types::PageLink;

/// Navigation must reach DOM readiness within this window.
pub const NAV_TIMEOUT: Duration = Duration::from_secs(45);

/// Additional fixed settle after readiness, for client-side rendering.
pub const NAV_SETTLE: Duration = Duration::from_millis(2500);

/// Upper bound for generic selector waits.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Hard cap on the snapshot text returned to callers.
pub const SNAPSHOT_MAX_CHARS: usize = 15_000;

/// Ordered cookie-consent dismissal heuristics, tried top to bottom after
/// every navigation. Best-effort: a selector that matches nothing, or a
/// click that fails, is silently ignored.
const CONSENT_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "[data-testid='uc-accept-all-button']",
    "button[data-action-type='ACCEPT']",
    ".artdeco-global-alert-action--primary",
    "button[aria-label*='Accept']",
    "button[title*='Accept all']",
];

/// In-page script producing a compact accessibility-tree-like rendering:
/// one line per heading/link/button/input/text leaf, invisible and
/// non-content elements skipped. Much smaller than raw markup and already
/// exposes the interactive roles the extraction prompt needs.
const SNAPSHOT_SCRIPT: &str = r#"
(() => {
  const out = [];
  const push = (s) => { if (s && s.trim()) out.push(s.trim().replace(/\s+/g, ' ')); };
  const visible = (el) => {
    const st = window.getComputedStyle(el);
    return st.display !== 'none' && st.visibility !== 'hidden';
  };
  const walk = (el) => {
    if (out.length > 2500 || !el || !el.tagName) return;
    const tag = el.tagName;
    if (['SCRIPT', 'STYLE', 'NOSCRIPT', 'SVG', 'IFRAME', 'TEMPLATE'].includes(tag)) return;
    if (!visible(el)) return;
    if (/^H[1-6]$/.test(tag)) { push('heading[' + tag.toLowerCase() + '] ' + el.innerText); return; }
    if (tag === 'A') {
      push('link "' + (el.innerText || '').slice(0, 120) + '" ' + (el.getAttribute('href') || ''));
      return;
    }
    if (tag === 'BUTTON') { push('button "' + (el.innerText || '').slice(0, 80) + '"'); return; }
    if (tag === 'INPUT' || tag === 'TEXTAREA' || tag === 'SELECT') {
      push('input[' + (el.getAttribute('type') || tag.toLowerCase()) + '] '
        + (el.getAttribute('aria-label') || el.getAttribute('placeholder') || el.getAttribute('name') || ''));
      return;
    }
    if (el.children.length === 0) { push('text ' + (el.innerText || '').slice(0, 300)); return; }
    for (const child of el.children) walk(child);
  };
  walk(document.body);
  return out.join('\n').slice(0, 15000);
})()
"#;

struct Session {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    page: Page,
    started_at: DateTime<Utc>,
}

/// Registry of live browser sessions, keyed by run-scoped name.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Launch a headless browser + single page under `name`, replacing any
    /// prior session with the same name.
    pub async fn launch(self: &Arc<Self>, name: &str) -> Result<SessionHandle> {
        let exe = chrome::find_chrome_executable().ok_or_else(|| {
            anyhow!("No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE.")
        })?;

        // Replace-on-launch keeps the one-session-per-name invariant even if
        // a caller reuses a name.
        self.close(name).await;

        info!("session '{}': launching browser ({})", name, exe);
        let config = chrome::build_headless_config(&exe)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser ({}): {}", exe, e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to open page: {}", e))?;

        self.sessions.lock().await.insert(
            name.to_string(),
            Session {
                browser,
                handler_task,
                page,
                started_at: Utc::now(),
            },
        );

        Ok(SessionHandle {
            manager: Arc::clone(self),
            name: name.to_string(),
        })
    }

    async fn page(&self, name: &str) -> Result<Page> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(name)
            .map(|s| s.page.clone())
            .ok_or_else(|| anyhow!("session not found: {}", name))
    }

    /// Load a URL: DOM readiness within [`NAV_TIMEOUT`], then a fixed
    /// [`NAV_SETTLE`] for client-side rendering, then best-effort
    /// cookie-consent dismissal.
    pub async fn navigate(&self, name: &str, url: &str) -> Result<()> {
        let page = self.page(name).await?;

        page.goto(url)
            .await
            .map_err(|e| anyhow!("navigation to {} failed: {}", url, e))?;
        if tokio::time::timeout(NAV_TIMEOUT, page.wait_for_navigation())
            .await
            .is_err()
        {
            return Err(anyhow!("navigation to {} timed out after {:?}", url, NAV_TIMEOUT));
        }
        tokio::time::sleep(NAV_SETTLE).await;

        self.dismiss_consent_overlays(&page).await;
        Ok(())
    }

    async fn dismiss_consent_overlays(&self, page: &Page) {
        for selector in CONSENT_SELECTORS {
            let script = format!(
                "(() => {{ const el = document.querySelector({sel:?}); if (el) {{ el.click(); return true; }} return false; }})()",
                sel = selector
            );
            match page.evaluate(script).await {
                Ok(v) => {
                    if v.into_value::<bool>().unwrap_or(false) {
                        info!("dismissed consent overlay via '{}'", selector);
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        return;
                    }
                }
                Err(_) => continue, // selector invalid on this page — ignore
            }
        }
    }

    pub async fn current_url(&self, name: &str) -> Result<String> {
        let page = self.page(name).await?;
        page.url()
            .await
            .map_err(|e| anyhow!("failed to read URL: {}", e))?
            .ok_or_else(|| anyhow!("page has no URL"))
    }

    /// Type `value` into the first element matching `selector`.
    pub async fn fill(&self, name: &str, selector: &str, value: &str) -> Result<()> {
        let page = self.page(name).await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| anyhow!("fill: element '{}' not found: {}", selector, e))?;
        element.click().await.ok(); // focus; non-fatal if the click is swallowed
        element
            .type_str(value)
            .await
            .map_err(|e| anyhow!("fill: typing into '{}' failed: {}", selector, e))?;
        Ok(())
    }

    pub async fn click(&self, name: &str, selector: &str) -> Result<()> {
        let page = self.page(name).await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| anyhow!("click: element '{}' not found: {}", selector, e))?;
        element
            .click()
            .await
            .map_err(|e| anyhow!("click on '{}' failed: {}", selector, e))?;
        Ok(())
    }

    /// Poll for `selector` until it appears, bounded by [`WAIT_TIMEOUT`].
    pub async fn wait_for(&self, name: &str, selector: &str) -> Result<()> {
        let page = self.page(name).await?;
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(anyhow!(
                    "wait_for: '{}' did not appear within {:?}",
                    selector,
                    WAIT_TIMEOUT
                ));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    pub async fn scroll_by(&self, name: &str, pixels: i64) -> Result<()> {
        let page = self.page(name).await?;
        page.evaluate(format!(
            "window.scrollBy({{top: {}, behavior: 'smooth'}});",
            pixels
        ))
        .await
        .map_err(|e| anyhow!("scroll failed: {}", e))?;
        Ok(())
    }

    /// Compact accessibility-like text rendering of the page, capped at
    /// [`SNAPSHOT_MAX_CHARS`].
    pub async fn snapshot(&self, name: &str) -> Result<String> {
        let page = self.page(name).await?;
        let text: String = page
            .evaluate(SNAPSHOT_SCRIPT)
            .await
            .map_err(|e| anyhow!("snapshot script failed: {}", e))?
            .into_value()
            .map_err(|e| anyhow!("snapshot result not a string: {}", e))?;
        Ok(truncate_chars(&text, SNAPSHOT_MAX_CHARS))
    }

    /// Collect anchors via an ordered selector cascade: the first selector
    /// yielding at least one link wins. `href` is read as a property, so
    /// returned URLs are already absolute.
    pub async fn extract_links(&self, name: &str, selectors: &[String]) -> Result<Vec<PageLink>> {
        let page = self.page(name).await?;
        for selector in selectors {
            let script = format!(
                r#"
                (() => Array.from(document.querySelectorAll({sel:?}))
                    .filter(el => el.href)
                    .map(el => ({{ url: el.href, text: (el.innerText || '').trim().slice(0, 200) }})))()
                "#,
                sel = selector
            );
            let links: Vec<PageLink> = match page.evaluate(script).await {
                Ok(v) => v.into_value().unwrap_or_default(),
                Err(e) => {
                    warn!("extract_links: selector '{}' failed: {}", selector, e);
                    continue;
                }
            };
            if !links.is_empty() {
                return Ok(links);
            }
        }
        Ok(Vec::new())
    }

    pub async fn page_html(&self, name: &str) -> Result<String> {
        let page = self.page(name).await?;
        page.content()
            .await
            .map_err(|e| anyhow!("failed to get page content: {}", e))
    }

    /// Release the session under `name`. Idempotent — unknown or
    /// already-closed names are a no-op, and close errors are swallowed so
    /// teardown can never shadow a pipeline error.
    pub async fn close(&self, name: &str) {
        let session = self.sessions.lock().await.remove(name);
        if let Some(mut session) = session {
            if let Err(e) = session.browser.close().await {
                warn!("session '{}': browser close error (non-fatal): {}", name, e);
            }
            session.handler_task.abort();
            info!(
                "session '{}' closed after {}s",
                name,
                (Utc::now() - session.started_at).num_seconds()
            );
        }
    }

    /// Close every live session. Used on daemon shutdown.
    pub async fn shutdown_all(&self) {
        let names: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        for name in names {
            self.close(&name).await;
        }
    }

    pub async fn open_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        // Best-effort cleanup. Drop cannot await; if we're inside a tokio
        // runtime, spawn tasks to close browsers to avoid zombie Chromium
        // processes.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if let Ok(mut sessions) = self.sessions.try_lock() {
            for (_, mut session) in sessions.drain() {
                session.handler_task.abort();
                handle.spawn(async move {
                    let _ = session.browser.close().await;
                });
            }
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

// ── Trait wiring ─────────────────────────────────────────────────────────────

/// A named session viewed through the [`PageDriver`] seam.
#[derive(Clone)]
pub struct SessionHandle {
    manager: Arc<SessionManager>,
    name: String,
}

impl SessionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl PageDriver for SessionHandle {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.manager.navigate(&self.name, url).await
    }

    async fn current_url(&self) -> Result<String> {
        self.manager.current_url(&self.name).await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.manager.fill(&self.name, selector, value).await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.manager.click(&self.name, selector).await
    }

    async fn scroll_by(&self, pixels: i64) -> Result<()> {
        self.manager.scroll_by(&self.name, pixels).await
    }

    async fn snapshot(&self) -> Result<String> {
        self.manager.snapshot(&self.name).await
    }

    async fn extract_links(&self, selectors: &[String]) -> Result<Vec<PageLink>> {
        self.manager.extract_links(&self.name, selectors).await
    }

    async fn page_html(&self) -> Result<String> {
        self.manager.page_html(&self.name).await
    }
}

#[async_trait]
impl BrowserSessions for Arc<SessionManager> {
    type Driver = SessionHandle;

    async fn launch(&self, name: &str) -> Result<SessionHandle> {
        SessionManager::launch(self, name).await
    }

    async fn close(&self, name: &str) {
        SessionManager::close(self, name).await;
    }

    async fn open_count(&self) -> usize {
        SessionManager::open_count(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn snapshot_script_declares_cap() {
        // The in-page slice and the Rust-side cap must agree.
        assert!(SNAPSHOT_SCRIPT.contains("15000"));
        assert_eq!(SNAPSHOT_MAX_CHARS, 15_000);
    }
}
