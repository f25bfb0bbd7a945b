//! Login state machine.
//!
//! Drives the target site's login form and classifies the post-submit URL.
//! This is the single authorization gate of the pipeline: no later stage
//! re-checks credentials, and collection never starts unless the outcome
//! here is [`LoginOutcome::Success`].

use anyhow::Result;
use tracing::{info, warn};

use super::site::SiteProfile;
use crate::browser::PageDriver;
use crate::core::types::SiteCredentials;

#[derive(Clone, Copy, Debug)]
enum LoginState {
    NotStarted,
    Submitted,
    Success,
    Challenge,
    Failure,
}

fn log_state(state: LoginState) {
    info!("login_state={:?}", state);
}

impl From<&LoginOutcome> for LoginState {
    fn from(outcome: &LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Success => LoginState::Success,
            LoginOutcome::Challenge { .. } => LoginState::Challenge,
            LoginOutcome::Failure { .. } => LoginState::Failure,
        }
    }
}

/// Tri-state result of one login attempt, derived once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// The site demanded verification (two-factor, CAPTCHA). Not retryable
    /// automatically; the message tells the human what to do.
    Challenge { message: String },
    /// Credentials rejected, or the login sequence itself failed.
    Failure { message: String },
}

/// Classify a post-submit URL path against the site's known prefix sets.
///
/// First match wins: success prefixes, then challenge prefixes, then the
/// login path itself (credentials rejected). Any other path is treated as
/// success — the site may have changed its landing route, and refusing to
/// proceed would be overly strict. That permissive default is a known risk.
pub fn classify_post_login_url(url: &str, site: &SiteProfile) -> LoginOutcome {
    let path = SiteProfile::path_of(url);

    if site.success_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
        return LoginOutcome::Success;
    }
    if site.challenge_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
        return LoginOutcome::Challenge {
            message: format!(
                "{} asked for additional verification (two-factor or bot check). \
                 Log in once from a regular browser to clear it, then re-run.",
                site.id
            ),
        };
    }
    if path.starts_with(site.login_path.as_str()) {
        return LoginOutcome::Failure {
            message: format!(
                "{} rejected the credentials — check the configured username and secret.",
                site.id
            ),
        };
    }

    LoginOutcome::Success
}

/// Run the login sequence: navigate, fill identifier and secret, submit,
/// settle, classify the landing URL.
///
/// Any error along the way is caught and reported as a [`LoginOutcome::Failure`]
/// carrying the underlying message — a broken login never panics a run.
pub async fn perform_login<D: PageDriver + ?Sized>(
    driver: &D,
    site: &SiteProfile,
    credentials: &SiteCredentials,
) -> LoginOutcome {
    match drive_login_form(driver, site, credentials).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("login sequence failed on {}: {}", site.id, e);
            log_state(LoginState::Failure);
            LoginOutcome::Failure {
                message: format!("login sequence failed: {}", e),
            }
        }
    }
}

async fn drive_login_form<D: PageDriver + ?Sized>(
    driver: &D,
    site: &SiteProfile,
    credentials: &SiteCredentials,
) -> Result<LoginOutcome> {
    log_state(LoginState::NotStarted);
    driver.navigate(&site.login_url).await?;

    driver
        .fill(&site.username_selector, &credentials.username)
        .await?;
    driver
        .fill(&site.secret_selector, &credentials.secret)
        .await?;
    driver.click(&site.submit_selector).await?;
    log_state(LoginState::Submitted);

    tokio::time::sleep(site.login_settle).await;

    let landed = driver.current_url().await?;
    let outcome = classify_post_login_url(&landed, site);
    log_state(LoginState::from(&outcome));
    info!("login on {} landed at {}", site.id, landed);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteProfile {
        SiteProfile::linkedin()
    }

    #[test]
    fn feed_landing_is_success() {
        assert_eq!(
            classify_post_login_url("https://www.linkedin.com/feed/", &site()),
            LoginOutcome::Success
        );
    }

    #[test]
    fn checkpoint_landing_is_challenge_with_remediation() {
        match classify_post_login_url("https://www.linkedin.com/checkpoint/challenge/x", &site()) {
            LoginOutcome::Challenge { message } => {
                assert!(message.contains("verification"));
            }
            other => panic!("expected Challenge, got {:?}", other),
        }
    }

    #[test]
    fn bouncing_back_to_login_is_failure() {
        match classify_post_login_url("https://www.linkedin.com/login?error=1", &site()) {
            LoginOutcome::Failure { message } => {
                assert!(message.contains("credentials"));
            }
            other => panic!("expected Failure, got {:?}", other),
        }
    }

    #[test]
    fn unknown_landing_route_is_treated_as_success() {
        // Permissive default: an unrecognized path means the site changed
        // its landing route, not that the login failed.
        assert_eq!(
            classify_post_login_url("https://www.linkedin.com/mynetwork/", &site()),
            LoginOutcome::Success
        );
    }

    #[test]
    fn challenge_wins_over_permissive_default() {
        // First-match-wins ordering: a challenge prefix must never fall
        // through to the catch-all success branch.
        assert!(matches!(
            classify_post_login_url("https://www.linkedin.com/uas/consumer-email-challenge", &site()),
            LoginOutcome::Challenge { .. }
        ));
    }
}
