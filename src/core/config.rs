use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ScoutConfig — file-based config loader (offer-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

/// Language-service sub-config (mirrors the `llm` key in offer-scout.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct LlmSettings {
    /// LLM endpoint — e.g. `https://api.openai.com/v1` or `http://localhost:11434/v1` (Ollama).
    pub base_url: Option<String>,
    /// API key. Never logged. Leave blank for key-less local endpoints.
    pub api_key: Option<String>,
    /// Model used for the structured-extraction call.
    pub extract_model: Option<String>,
    /// Cheaper model used for per-offer description cleanup.
    pub cleanup_model: Option<String>,
}

impl LlmSettings {
    /// API key: JSON field → `OPENAI_API_KEY` env var → `None`.
    ///
    /// When `api_key` is explicitly set to `""` in the config file, returns `Some("")`.
    /// This signals "no key required" (Ollama / LM Studio) — calls proceed without auth.
    /// Returns `None` only when the field is absent from config AND `OPENAI_API_KEY` is unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(k) = &self.api_key {
            return Some(k.trim().to_string());
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// LLM base URL: JSON field → `OPENAI_BASE_URL` env var → `https://api.openai.com/v1`.
    pub fn resolve_base_url(&self) -> String {
        if let Some(u) = &self.base_url {
            if !u.trim().is_empty() {
                return u.clone();
            }
        }
        std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
    }

    /// Extraction model: JSON field → `OFFER_SCOUT_EXTRACT_MODEL` env var → `gpt-4o-mini`.
    pub fn resolve_extract_model(&self) -> String {
        if let Some(m) = &self.extract_model {
            if !m.trim().is_empty() {
                return m.clone();
            }
        }
        std::env::var("OFFER_SCOUT_EXTRACT_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "gpt-4o-mini".to_string())
    }

    /// Cleanup model: JSON field → `OFFER_SCOUT_CLEANUP_MODEL` env var → `gpt-4o-mini`.
    pub fn resolve_cleanup_model(&self) -> String {
        if let Some(m) = &self.cleanup_model {
            if !m.trim().is_empty() {
                return m.clone();
            }
        }
        std::env::var("OFFER_SCOUT_CLEANUP_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "gpt-4o-mini".to_string())
    }
}

/// Top-level config loaded from `offer-scout.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    #[serde(default)]
    pub llm: LlmSettings,
    /// Trigger-evaluator cadence in seconds. The scheduler's matching
    /// precision is ±1 cadence; the default of 60 gives minute precision.
    #[serde(default)]
    pub scheduler_tick_secs: Option<u64>,
}

impl ScoutConfig {
    pub fn resolve_tick_secs(&self) -> u64 {
        self.scheduler_tick_secs.unwrap_or(60).max(1)
    }
}

/// Load `offer-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `OFFER_SCOUT_CONFIG` env var path
/// 2. `./offer-scout.json` (process cwd)
/// 3. `~/.offer-scout/config.json`
///
/// Missing file → `ScoutConfig::default()` (silent, all env-var fallbacks apply).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(env_path) = std::env::var("OFFER_SCOUT_CONFIG") {
        candidates.push(PathBuf::from(env_path));
    }
    candidates.push(PathBuf::from("offer-scout.json"));
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".offer-scout").join("config.json"));
    }

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<ScoutConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("offer-scout.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "offer-scout.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return ScoutConfig::default();
                }
            },
            Err(_) => continue, // file not found at this path — try next
        }
    }

    // No config file found anywhere — silently use defaults (env-var fallbacks apply).
    ScoutConfig::default()
}

// ---------------------------------------------------------------------------

pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

/// Optional override for the Chromium-family browser executable.
///
/// Default behavior is **auto-discovery** (see `browser::chrome::find_chrome_executable()`).
/// This function only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}
