//! Description cleanup: raw detail-page text → readable posting prose.
//!
//! Runs on the cheaper model tier, once per enriched offer. The caller owns
//! the keep-or-fallback decision; this module only shapes the call.

use anyhow::Result;

use super::client::{LanguageModel, ModelTier};

/// Raw description text is truncated to this before the cleanup call.
pub const CLEANUP_INPUT_MAX_CHARS: usize = 12_000;

const CLEANUP_SYSTEM_PROMPT: &str =
    "You clean up job postings scraped from web pages. Keep only: company context, \
     responsibilities, required stack and skills, and the candidate profile sought. \
     Strip navigation, footers, cookie and legal notices, promotional blocks and \
     application-form boilerplate. Respond in structured prose with short paragraphs. \
     Do not output JSON.";

/// Send raw extracted text through the cleanup model.
pub async fn cleanup_description(llm: &dyn LanguageModel, raw_text: &str) -> Result<String> {
    let input: String = if raw_text.chars().count() > CLEANUP_INPUT_MAX_CHARS {
        raw_text.chars().take(CLEANUP_INPUT_MAX_CHARS).collect()
    } else {
        raw_text.to_string()
    };
    llm.complete(ModelTier::Cleanup, CLEANUP_SYSTEM_PROMPT, &input)
        .await
}
