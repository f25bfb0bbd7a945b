//! OpenAI-compatible chat-completions client.
//!
//! Both language-service calls of a run go through here: the structured
//! extraction call and the per-offer cleanup call, each on its own
//! configured model. Point `base_url` at Ollama / LM Studio for fully local
//! inference; an empty API key means "no auth header" for such endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::core::config::LlmSettings;

/// Which configured model a completion should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// The structured-extraction model (strict JSON output contract).
    Extraction,
    /// The cheaper cleanup model (structured prose output).
    Cleanup,
}

/// The language-understanding seam. Production uses [`OpenAiCompatClient`];
/// tests script replies.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// True when a credential is configured. Checked by the run controller
    /// before any browser resource is opened.
    fn credential_configured(&self) -> bool;

    async fn complete(&self, tier: ModelTier, system: &str, user: &str) -> Result<String>;
}

pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    /// `None` = not configured (fail fast); `Some("")` = key-less local endpoint.
    api_key: Option<String>,
    extract_model: String,
    cleanup_model: String,
}

impl OpenAiCompatClient {
    pub fn from_settings(http: reqwest::Client, settings: &LlmSettings) -> Self {
        Self {
            http,
            base_url: settings.resolve_base_url(),
            api_key: settings.resolve_api_key(),
            extract_model: settings.resolve_extract_model(),
            cleanup_model: settings.resolve_cleanup_model(),
        }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Extraction => &self.extract_model,
            ModelTier::Cleanup => &self.cleanup_model,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatClient {
    fn credential_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, tier: ModelTier, system: &str, user: &str) -> Result<String> {
        let model = self.model_for(tier);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("llm: {} call on {}", model, url);

        let body = serde_json::json!({
            "model": model,
            "temperature": 0.2,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ]
        });

        let builder = self.http.post(url).json(&body);
        // Only send Authorization when a key is provided; key-less local
        // endpoints (Ollama / LM Studio) work without it.
        let builder = match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => builder.bearer_auth(key.trim()),
            _ => builder,
        };

        let response = builder
            .send()
            .await
            .context("chat.completions request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("chat.completions failed: status={} body={}", status, text);
        }

        let value: serde_json::Value = response
            .json()
            .await
            .context("chat.completions response json parse failed")?;

        value
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("chat.completions reply carried no text content"))
    }
}
