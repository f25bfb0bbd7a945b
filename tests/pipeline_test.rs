//! End-to-end pipeline properties over scripted fakes.
//!
//! Every network-facing seam — browser sessions, page primitives, the
//! language service, the collaborator stores — is replaced with a scripted
//! implementation, so the invariants of the run controller (stage gating,
//! guaranteed session teardown, per-item failure isolation) are checked
//! without a Chromium process or an API key. Tests run under paused tokio
//! time, so the pipeline's pacing sleeps cost nothing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use offer_scout::browser::{BrowserSessions, PageDriver};
use offer_scout::llm::{LanguageModel, ModelTier};
use offer_scout::runner::{run_search, RunError};
use offer_scout::schedule::{ConsumerOutcome, RunConsumer, TriggerEvent};
use offer_scout::scrape::collect::{collect_pages, CollectError};
use offer_scout::store::{MemoryStore, OfferStore, ProfileStore, RunStatusStore};
use offer_scout::types::{PageLink, RunState, SearchCriteria, SiteCredentials, UserId};
use offer_scout::SiteProfile;

// ── Scripted page driver ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct FakePage {
    /// URL reported after navigation; defaults to the navigated URL.
    current_url: Option<String>,
    snapshot: String,
    links: Vec<PageLink>,
    html: String,
    fail_navigation: bool,
}

#[derive(Default)]
struct DriverState {
    pages: HashMap<String, FakePage>,
    navigations: Vec<String>,
    filled: Vec<(String, String)>,
    clicked: Vec<String>,
    location: String,
    active: FakePage,
}

#[derive(Clone, Default)]
struct FakeDriver {
    state: Arc<Mutex<DriverState>>,
}

impl FakeDriver {
    fn script_page(&self, url: &str, page: FakePage) {
        self.state.lock().unwrap().pages.insert(url.into(), page);
    }

    fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    fn filled(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().filled.clone()
    }

    fn clicked(&self) -> Vec<String> {
        self.state.lock().unwrap().clicked.clone()
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        let page = state.pages.get(url).cloned().unwrap_or_default();
        if page.fail_navigation {
            return Err(anyhow!("net::ERR_CONNECTION_RESET at {}", url));
        }
        state.location = page.current_url.clone().unwrap_or_else(|| url.to_string());
        state.active = page;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().location.clone())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .filled
            .push((selector.into(), value.into()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.state.lock().unwrap().clicked.push(selector.into());
        Ok(())
    }

    async fn scroll_by(&self, _pixels: i64) -> Result<()> {
        Ok(())
    }

    async fn snapshot(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().active.snapshot.clone())
    }

    async fn extract_links(&self, _selectors: &[String]) -> Result<Vec<PageLink>> {
        Ok(self.state.lock().unwrap().active.links.clone())
    }

    async fn page_html(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().active.html.clone())
    }
}

// ── Scripted session registry ────────────────────────────────────────────────

#[derive(Clone)]
struct FakeSessions {
    driver: FakeDriver,
    open: Arc<Mutex<HashSet<String>>>,
    launches: Arc<Mutex<usize>>,
}

impl FakeSessions {
    fn new(driver: FakeDriver) -> Self {
        Self {
            driver,
            open: Arc::new(Mutex::new(HashSet::new())),
            launches: Arc::new(Mutex::new(0)),
        }
    }

    fn launch_count(&self) -> usize {
        *self.launches.lock().unwrap()
    }
}

#[async_trait]
impl BrowserSessions for FakeSessions {
    type Driver = FakeDriver;

    async fn launch(&self, name: &str) -> Result<FakeDriver> {
        *self.launches.lock().unwrap() += 1;
        self.open.lock().unwrap().insert(name.to_string());
        Ok(self.driver.clone())
    }

    async fn close(&self, name: &str) {
        self.open.lock().unwrap().remove(name);
    }

    async fn open_count(&self) -> usize {
        self.open.lock().unwrap().len()
    }
}

// ── Scripted language service ────────────────────────────────────────────────

struct FakeModel {
    configured: bool,
    extraction_reply: String,
    /// Fixed cleanup reply; `None` auto-generates one comfortably over the
    /// minimum-length threshold.
    cleanup_reply: Option<String>,
    calls: Mutex<Vec<ModelTier>>,
}

impl FakeModel {
    fn new(extraction_reply: &str) -> Self {
        Self {
            configured: true,
            extraction_reply: extraction_reply.into(),
            cleanup_reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn unconfigured() -> Self {
        let mut model = Self::new("[]");
        model.configured = false;
        model
    }

    fn calls(&self) -> Vec<ModelTier> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn credential_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, tier: ModelTier, _system: &str, user: &str) -> Result<String> {
        self.calls.lock().unwrap().push(tier);
        match tier {
            ModelTier::Extraction => Ok(self.extraction_reply.clone()),
            ModelTier::Cleanup => Ok(self.cleanup_reply.clone().unwrap_or_else(|| {
                format!(
                    "CLEANED SUMMARY: {}",
                    user.chars().take(150).collect::<String>()
                )
            })),
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn criteria() -> SearchCriteria {
    SearchCriteria {
        query: "rust engineer".into(),
        location: "Paris".into(),
        sites: vec!["linkedin".into()],
        contract_types: vec![],
        remote: false,
        min_salary: None,
        excluded_keywords: vec![],
        credentials: SiteCredentials {
            username: "jane@example.com".into(),
            secret: "hunter2".into(),
        },
    }
}

fn results_snapshot(count: usize) -> String {
    let cards = (0..count)
        .map(|i| format!("link \"Rust Engineer {i} — Acme Corp, Paris\" /jobs/view/{i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let mut snapshot = format!(
        "heading[h1] Jobs matching your search\n\
         text Showing results for rust engineer in Paris, sorted by relevance.\n\
         button \"All filters\"\nbutton \"Date posted\"\nbutton \"Experience level\"\n{cards}"
    );
    // Keep fixture pages safely above the empty-page snapshot threshold,
    // whatever the card count.
    while snapshot.len() < 600 {
        snapshot.push_str("\ntext Set a job alert to get notified about new offers like these.");
    }
    snapshot
}

fn result_links(range: std::ops::Range<usize>) -> Vec<PageLink> {
    range
        .map(|i| PageLink {
            url: format!("https://www.linkedin.com/jobs/view/{i}"),
            text: format!("Rust Engineer {i}"),
        })
        .collect()
}

fn extraction_reply(range: std::ops::Range<usize>) -> String {
    let entries: Vec<String> = range
        .map(|i| {
            format!(
                r#"{{"title":"Rust Engineer {i}","company":"Acme","location":"Paris","url":"https://www.linkedin.com/jobs/view/{i}","description":"short"}}"#
            )
        })
        .collect();
    format!("Here are the offers: [{}] Done.", entries.join(","))
}

fn detail_html() -> String {
    let body = "You will design, build and operate the ingestion and enrichment \
                pipeline behind our search product, own reliability of the headless \
                collection fleet, and pair with product engineers on ranking quality. \
                Strong Rust and async experience expected."
        .repeat(2);
    format!(
        r#"<html><body><div class="jobs-description__content">{body}</div></body></html>"#
    )
}

/// Wire a driver for a successful login landing on the feed.
fn script_login_success(driver: &FakeDriver, site: &SiteProfile) {
    driver.script_page(
        &site.login_url,
        FakePage {
            current_url: Some(format!("{}/feed/", site.base_url)),
            ..Default::default()
        },
    );
}

// ── Authentication gating ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn challenge_login_skips_collection_and_closes_session() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    driver.script_page(
        &site.login_url,
        FakePage {
            current_url: Some(format!("{}/checkpoint/challenge/xyz", site.base_url)),
            ..Default::default()
        },
    );
    let sessions = FakeSessions::new(driver.clone());
    let model = FakeModel::new("[]");

    let err = run_search(&sessions, &model, &"u1".to_string(), &criteria())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::LoginChallenge { .. }));
    // Collection never started: the only navigation was the login page.
    assert_eq!(driver.navigations(), vec![site.login_url.clone()]);
    // And the session is gone.
    assert_eq!(sessions.open_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_credentials_skip_collection_and_close_session() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    driver.script_page(
        &site.login_url,
        FakePage {
            current_url: Some(format!("{}/login?error=credentials", site.base_url)),
            ..Default::default()
        },
    );
    let sessions = FakeSessions::new(driver.clone());
    let model = FakeModel::new("[]");

    let err = run_search(&sessions, &model, &"u1".to_string(), &criteria())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::LoginFailed { .. }));
    assert_eq!(driver.navigations().len(), 1);
    assert_eq!(sessions.open_count().await, 0);
    // Extraction was never attempted either.
    assert!(model.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn login_fills_both_secrets_before_submit() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    script_login_success(&driver, &site);
    // No result pages scripted: page 0 renders an empty snapshot, so the run
    // ends cleanly right after login.
    let sessions = FakeSessions::new(driver.clone());
    let model = FakeModel::new("[]");

    let report = run_search(&sessions, &model, &"u1".to_string(), &criteria())
        .await
        .unwrap();

    assert!(report.offers.is_empty());
    let filled = driver.filled();
    assert_eq!(filled.len(), 2);
    assert_eq!(filled[0].0, site.username_selector);
    assert_eq!(filled[1].0, site.secret_selector);
    assert_eq!(driver.clicked(), vec![site.submit_selector.clone()]);
}

// ── Configuration gating ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn missing_llm_credential_fails_before_any_launch() {
    let sessions = FakeSessions::new(FakeDriver::default());
    let model = FakeModel::unconfigured();

    let err = run_search(&sessions, &model, &"u1".to_string(), &criteria())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::MissingLlmCredential));
    assert_eq!(sessions.launch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_site_fails_before_any_launch() {
    let sessions = FakeSessions::new(FakeDriver::default());
    let model = FakeModel::new("[]");
    let mut bad = criteria();
    bad.sites = vec!["monster".into()];

    let err = run_search(&sessions, &model, &"u1".to_string(), &bad)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::UnknownSite(_)));
    assert_eq!(sessions.launch_count(), 0);
}

// ── Pagination heuristics ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn pagination_stops_when_a_later_page_adds_no_new_links() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    let crit = criteria();

    driver.script_page(
        &site.search_url(&crit, 0),
        FakePage {
            snapshot: results_snapshot(25),
            links: result_links(0..25),
            ..Default::default()
        },
    );
    driver.script_page(
        &site.search_url(&crit, 25),
        FakePage {
            snapshot: results_snapshot(25),
            links: result_links(25..50),
            ..Default::default()
        },
    );
    // Third page renders, but every link on it was already seen.
    driver.script_page(
        &site.search_url(&crit, 50),
        FakePage {
            snapshot: results_snapshot(25),
            links: result_links(25..50),
            ..Default::default()
        },
    );

    let outcome = collect_pages(&driver, &site, &crit).await.unwrap();
    assert_eq!(outcome.links.len(), 50);
    assert_eq!(outcome.pages_collected, 2);
    assert!(outcome.snapshot.contains("--- PAGE 1 ---"));
    assert!(outcome.snapshot.contains("--- PAGE 2 ---"));
    assert!(!outcome.snapshot.contains("--- PAGE 3 ---"));
}

#[tokio::test(start_paused = true)]
async fn short_snapshot_stops_pagination_before_the_next_request() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    let crit = criteria();

    driver.script_page(
        &site.search_url(&crit, 0),
        FakePage {
            snapshot: results_snapshot(25),
            links: result_links(0..25),
            ..Default::default()
        },
    );
    driver.script_page(
        &site.search_url(&crit, 25),
        FakePage {
            snapshot: "No more results".into(),
            ..Default::default()
        },
    );

    let outcome = collect_pages(&driver, &site, &crit).await.unwrap();
    assert_eq!(outcome.pages_collected, 1);
    assert_eq!(outcome.links.len(), 25);
    // Page index 2 must never have been requested.
    let page3 = site.search_url(&crit, 50);
    assert!(!driver.navigations().contains(&page3));
}

#[tokio::test(start_paused = true)]
async fn block_on_first_page_is_fatal() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    let crit = criteria();

    driver.script_page(
        &site.search_url(&crit, 0),
        FakePage {
            current_url: Some(format!("{}/checkpoint/challenge/block", site.base_url)),
            ..Default::default()
        },
    );

    let err = collect_pages(&driver, &site, &crit).await.unwrap_err();
    assert!(matches!(err, CollectError::BlockedAtEntry(_)));
}

#[tokio::test(start_paused = true)]
async fn block_on_later_page_keeps_collected_pages() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    let crit = criteria();

    driver.script_page(
        &site.search_url(&crit, 0),
        FakePage {
            snapshot: results_snapshot(25),
            links: result_links(0..25),
            ..Default::default()
        },
    );
    driver.script_page(
        &site.search_url(&crit, 25),
        FakePage {
            current_url: Some("https://www.linkedin.com/captcha/gate".into()),
            ..Default::default()
        },
    );

    let outcome = collect_pages(&driver, &site, &crit).await.unwrap();
    assert_eq!(outcome.pages_collected, 1);
    assert_eq!(outcome.links.len(), 25);
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn full_run_enriches_descriptions_and_isolates_one_failure() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    let crit = criteria();

    script_login_success(&driver, &site);
    driver.script_page(
        &site.search_url(&crit, 0),
        FakePage {
            snapshot: results_snapshot(16),
            links: result_links(1..17),
            ..Default::default()
        },
    );
    driver.script_page(
        &site.search_url(&crit, 25),
        FakePage {
            snapshot: "done".into(),
            ..Default::default()
        },
    );

    // Detail pages for offers 1..=16; number 7 dies mid-loop.
    for i in 1..17usize {
        driver.script_page(
            &format!("https://www.linkedin.com/jobs/view/{i}"),
            FakePage {
                html: detail_html(),
                fail_navigation: i == 7,
                ..Default::default()
            },
        );
    }

    let sessions = FakeSessions::new(driver.clone());
    let model = FakeModel::new(&extraction_reply(1..17));

    let report = run_search(&sessions, &model, &"u1".to_string(), &crit)
        .await
        .unwrap();

    assert_eq!(report.offers.len(), 16);
    assert_eq!(report.pages_collected, 1);
    // 15 attempted (cap), one failed navigation → 14 enriched.
    assert_eq!(report.enriched_count, 14);

    // Offers around the failure were still enriched.
    assert!(report.offers[5].description.starts_with("CLEANED SUMMARY:"));
    assert!(report.offers[7].description.starts_with("CLEANED SUMMARY:"));
    // The failed offer and the one past the cap keep their listing text.
    assert_eq!(report.offers[6].description, "short");
    assert_eq!(report.offers[15].description, "short");

    // One extraction call, one cleanup call per successful detail visit.
    let calls = model.calls();
    assert_eq!(
        calls.iter().filter(|t| **t == ModelTier::Extraction).count(),
        1
    );
    assert_eq!(calls.iter().filter(|t| **t == ModelTier::Cleanup).count(), 14);

    assert_eq!(sessions.open_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn short_cleanup_reply_falls_back_to_raw_text() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    let crit = criteria();

    script_login_success(&driver, &site);
    driver.script_page(
        &site.search_url(&crit, 0),
        FakePage {
            snapshot: results_snapshot(1),
            links: result_links(1..2),
            ..Default::default()
        },
    );
    driver.script_page(
        &site.search_url(&crit, 25),
        FakePage {
            snapshot: "done".into(),
            ..Default::default()
        },
    );
    driver.script_page(
        "https://www.linkedin.com/jobs/view/1",
        FakePage {
            html: detail_html(),
            ..Default::default()
        },
    );

    let sessions = FakeSessions::new(driver.clone());
    let mut model = FakeModel::new(&extraction_reply(1..2));
    model.cleanup_reply = Some("ok".into()); // under the 100-char minimum

    let report = run_search(&sessions, &model, &"u1".to_string(), &crit)
        .await
        .unwrap();

    assert_eq!(report.offers.len(), 1);
    // The raw detail text replaced the stub because it is longer; the
    // too-short cleanup reply was discarded.
    assert!(report.offers[0].description.len() > 100);
    assert!(report.offers[0].description.contains("ingestion and enrichment"));
    assert!(!report.offers[0].description.contains("CLEANED"));
}

#[tokio::test(start_paused = true)]
async fn blocked_entry_closes_session_and_surfaces_typed_error() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    let crit = criteria();

    script_login_success(&driver, &site);
    driver.script_page(
        &site.search_url(&crit, 0),
        FakePage {
            current_url: Some(format!("{}/checkpoint/challenge/block", site.base_url)),
            ..Default::default()
        },
    );

    let sessions = FakeSessions::new(driver.clone());
    let model = FakeModel::new("[]");

    let err = run_search(&sessions, &model, &"u1".to_string(), &crit)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Blocked(_)));
    assert_eq!(sessions.open_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn zero_extracted_offers_skip_enrichment() {
    let site = SiteProfile::linkedin();
    let driver = FakeDriver::default();
    let crit = criteria();

    script_login_success(&driver, &site);
    driver.script_page(
        &site.search_url(&crit, 0),
        FakePage {
            snapshot: results_snapshot(25),
            links: result_links(0..25),
            ..Default::default()
        },
    );
    driver.script_page(
        &site.search_url(&crit, 25),
        FakePage {
            snapshot: "done".into(),
            ..Default::default()
        },
    );

    let sessions = FakeSessions::new(driver.clone());
    let model = FakeModel::new("Sorry, I could not find a structured list.");

    let report = run_search(&sessions, &model, &"u1".to_string(), &crit)
        .await
        .unwrap();

    assert!(report.offers.is_empty());
    assert_eq!(report.pages_collected, 1);
    // No cleanup calls without offers.
    assert_eq!(
        model
            .calls()
            .iter()
            .filter(|t| **t == ModelTier::Cleanup)
            .count(),
        0
    );
    assert_eq!(sessions.open_count().await, 0);
}

// ── Scheduling consumer ──────────────────────────────────────────────────────

fn consumer_with_store(
    driver: FakeDriver,
    model: FakeModel,
    store: Arc<MemoryStore>,
) -> (Arc<RunConsumer<FakeSessions>>, FakeSessions) {
    let sessions = FakeSessions::new(driver);
    let consumer = RunConsumer::new(
        sessions.clone(),
        Arc::new(model) as Arc<dyn LanguageModel>,
        Arc::clone(&store) as Arc<dyn ProfileStore>,
        Arc::clone(&store) as Arc<dyn OfferStore>,
        store as Arc<dyn RunStatusStore>,
    );
    (consumer, sessions)
}

#[tokio::test(start_paused = true)]
async fn consumer_skips_users_without_credentials() {
    let store = Arc::new(MemoryStore::new());
    let (consumer, _) = consumer_with_store(FakeDriver::default(), FakeModel::new("[]"), store);

    let outcome = consumer
        .handle(TriggerEvent {
            user_id: "ghost".into(),
        })
        .await;

    assert_eq!(
        outcome,
        ConsumerOutcome::Skipped {
            reason: "no stored credentials".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn consumer_skips_users_without_active_criteria() {
    let user: UserId = "u1".into();
    let store = Arc::new(MemoryStore::new());
    store
        .seed_credentials(
            &user,
            SiteCredentials {
                username: "jane@example.com".into(),
                secret: "hunter2".into(),
            },
        )
        .await;
    let (consumer, _) = consumer_with_store(FakeDriver::default(), FakeModel::new("[]"), store);

    let outcome = consumer.handle(TriggerEvent { user_id: user }).await;

    assert_eq!(
        outcome,
        ConsumerOutcome::Skipped {
            reason: "no active search criteria".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn consumer_upserts_results_and_duplicate_events_stay_idempotent() {
    let user: UserId = "u1".into();
    let site = SiteProfile::linkedin();
    let crit = criteria();

    let driver = FakeDriver::default();
    script_login_success(&driver, &site);
    driver.script_page(
        &site.search_url(&crit, 0),
        FakePage {
            snapshot: results_snapshot(2),
            links: result_links(1..3),
            ..Default::default()
        },
    );
    driver.script_page(
        &site.search_url(&crit, 25),
        FakePage {
            snapshot: "done".into(),
            ..Default::default()
        },
    );
    for i in 1..3usize {
        driver.script_page(
            &format!("https://www.linkedin.com/jobs/view/{i}"),
            FakePage {
                html: detail_html(),
                ..Default::default()
            },
        );
    }

    let store = Arc::new(MemoryStore::new());
    store.seed_credentials(&user, crit.credentials.clone()).await;
    store.seed_criteria(&user, vec![crit.clone()]).await;

    let (consumer, sessions) = consumer_with_store(
        driver,
        FakeModel::new(&extraction_reply(1..3)),
        Arc::clone(&store),
    );

    let outcome = consumer
        .handle(TriggerEvent {
            user_id: user.clone(),
        })
        .await;
    assert_eq!(
        outcome,
        ConsumerOutcome::Completed {
            runs: 1,
            offers_upserted: 2,
            upsert_failures: vec![],
            run_errors: 0
        }
    );

    let rows = store.offers_for(&user).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.is_new && r.origin == "linkedin"));

    // Duplicate delivery of the same trigger: same rows, no duplicates,
    // rows no longer flagged new.
    consumer
        .handle(TriggerEvent {
            user_id: user.clone(),
        })
        .await;
    let rows = store.offers_for(&user).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| !r.is_new && r.origin == "linkedin"));

    assert_eq!(sessions.open_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn consumer_records_run_status_transitions() {
    let user: UserId = "u1".into();
    let site = SiteProfile::linkedin();
    let crit = criteria();

    // Login lands on a challenge page, so the run fails with a typed error.
    let driver = FakeDriver::default();
    driver.script_page(
        &site.login_url,
        FakePage {
            current_url: Some(format!("{}/checkpoint/challenge/x", site.base_url)),
            ..Default::default()
        },
    );

    let store = Arc::new(MemoryStore::new());
    store.seed_credentials(&user, crit.credentials.clone()).await;
    store.seed_criteria(&user, vec![crit.clone()]).await;

    let (consumer, _) =
        consumer_with_store(driver, FakeModel::new("[]"), Arc::clone(&store));

    let outcome = consumer
        .handle(TriggerEvent {
            user_id: user.clone(),
        })
        .await;
    assert_eq!(
        outcome,
        ConsumerOutcome::Completed {
            runs: 1,
            offers_upserted: 0,
            upsert_failures: vec![],
            run_errors: 1
        }
    );

    // The pending row created before the run transitioned to a specific,
    // human-readable error — never a raw stack trace.
    let statuses = store.statuses_for(&user).await;
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].finished_at.is_some());
    match &statuses[0].state {
        RunState::Error { message } => assert!(message.contains("login challenge")),
        other => panic!("expected error state, got {:?}", other),
    }
}
