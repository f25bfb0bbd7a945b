pub mod cleanup;
pub mod client;
pub mod extract;

pub use client::{LanguageModel, ModelTier, OpenAiCompatClient};
