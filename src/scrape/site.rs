//! Per-site configuration: URLs, selector cascades, URL-prefix sets and
//! pacing discipline.
//!
//! Everything the pipeline knows about a concrete target site lives in one
//! [`SiteProfile`] value, so supporting a second site is a data change, not
//! a code change. Selector cascades are ordered most-specific-first because
//! structural class names on these sites churn frequently.

use aho_corasick::AhoCorasick;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

use crate::core::types::SearchCriteria;

/// URL substrings that mark an anti-automation interstitial. Hitting one of
/// these mid-pagination ends the collection; hitting one on the first page
/// fails the run.
const BLOCK_SIGNATURES: &[&str] = &["captcha", "checkpoint", "challenge", "verify", "authwall"];

static BLOCK_MATCHER: OnceLock<AhoCorasick> = OnceLock::new();

fn block_matcher() -> &'static AhoCorasick {
    BLOCK_MATCHER.get_or_init(|| {
        // Patterns are simple substrings; Aho-Corasick gives linear-time scan.
        AhoCorasick::new(BLOCK_SIGNATURES).expect("valid block signatures")
    })
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Stable site identifier, stamped onto every offer as its source.
    pub id: String,
    pub base_url: String,
    pub login_url: String,
    /// Path prefix of the login form itself. Landing back here after submit
    /// means the credentials were rejected.
    pub login_path: String,
    /// Path prefixes of the authenticated landing pages.
    pub success_prefixes: Vec<String>,
    /// Path prefixes of two-factor / bot-verification interstitials.
    pub challenge_prefixes: Vec<String>,
    pub username_selector: String,
    pub secret_selector: String,
    pub submit_selector: String,
    /// Offsets in the results URL advance by this much per page.
    pub results_per_page: u32,
    /// Ordered cascade of anchor selectors for result cards.
    pub link_selectors: Vec<String>,
    /// Fixed wait after submitting the login form, before the landing URL
    /// is classified.
    pub login_settle: Duration,
    /// Pause between lazy-load scroll steps on a results page.
    pub scroll_pause: Duration,
    /// Pause between successive detail-page visits. Anti-scraping rate
    /// limits trip on faster cadences.
    pub detail_pause: Duration,
}

impl SiteProfile {
    /// Profile registry. Currently one supported site.
    pub fn for_id(id: &str) -> Option<SiteProfile> {
        match id.to_ascii_lowercase().as_str() {
            "linkedin" => Some(Self::linkedin()),
            _ => None,
        }
    }

    pub fn linkedin() -> SiteProfile {
        SiteProfile {
            id: "linkedin".into(),
            base_url: "https://www.linkedin.com".into(),
            login_url: "https://www.linkedin.com/login".into(),
            login_path: "/login".into(),
            success_prefixes: vec!["/feed".into(), "/home".into()],
            challenge_prefixes: vec!["/checkpoint".into(), "/challenge".into(), "/uas/".into()],
            username_selector: "#username".into(),
            secret_selector: "#password".into(),
            submit_selector: "button[type='submit']".into(),
            results_per_page: 25,
            link_selectors: vec![
                "a.job-card-container__link".into(),
                "a.job-card-list__title".into(),
                "a[href*='/jobs/view/']".into(),
            ],
            login_settle: Duration::from_millis(3000),
            scroll_pause: Duration::from_millis(400),
            detail_pause: Duration::from_millis(1500),
        }
    }

    /// Offset-paginated results URL for one page of a criteria set.
    pub fn search_url(&self, criteria: &SearchCriteria, offset: u32) -> String {
        let keywords = utf8_percent_encode(&criteria.query, NON_ALPHANUMERIC);
        let location = utf8_percent_encode(&criteria.location, NON_ALPHANUMERIC);
        let mut url = format!(
            "{}/jobs/search/?keywords={}&location={}&start={}",
            self.base_url, keywords, location, offset
        );
        if criteria.remote {
            url.push_str("&f_WT=2");
        }
        url
    }

    /// True when `url` carries an anti-automation block signature.
    pub fn is_block_url(&self, url: &str) -> bool {
        block_matcher().is_match(&url.to_ascii_lowercase())
    }

    /// The path component of `url`, or the raw string when it does not parse
    /// as an absolute URL.
    pub fn path_of(url: &str) -> String {
        Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SiteCredentials;

    fn criteria(query: &str, location: &str, remote: bool) -> SearchCriteria {
        SearchCriteria {
            query: query.into(),
            location: location.into(),
            sites: vec!["linkedin".into()],
            contract_types: vec![],
            remote,
            min_salary: None,
            excluded_keywords: vec![],
            credentials: SiteCredentials {
                username: "u".into(),
                secret: "s".into(),
            },
        }
    }

    #[test]
    fn search_url_encodes_query_and_offset() {
        let site = SiteProfile::linkedin();
        let url = site.search_url(&criteria("rust engineer", "Paris, France", false), 50);
        assert!(url.contains("keywords=rust%20engineer"));
        assert!(url.contains("location=Paris%2C%20France"));
        assert!(url.contains("start=50"));
        assert!(!url.contains("f_WT"));
    }

    #[test]
    fn search_url_adds_remote_filter() {
        let site = SiteProfile::linkedin();
        let url = site.search_url(&criteria("dev", "Lyon", true), 0);
        assert!(url.contains("f_WT=2"));
    }

    #[test]
    fn block_signatures_match_case_insensitively() {
        let site = SiteProfile::linkedin();
        assert!(site.is_block_url("https://www.linkedin.com/checkpoint/challenge/abc"));
        assert!(site.is_block_url("https://example.com/CAPTCHA?x=1"));
        assert!(site.is_block_url("https://example.com/account/verify"));
        assert!(!site.is_block_url("https://www.linkedin.com/jobs/search/?start=0"));
    }

    #[test]
    fn registry_is_case_insensitive() {
        assert!(SiteProfile::for_id("LinkedIn").is_some());
        assert!(SiteProfile::for_id("unknown-board").is_none());
    }

    #[test]
    fn path_of_falls_back_to_raw_string() {
        assert_eq!(SiteProfile::path_of("https://x.test/feed/?a=1"), "/feed/");
        assert_eq!(SiteProfile::path_of("not a url"), "not a url");
    }
}
