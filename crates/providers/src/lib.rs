//! LLM provider implementation for TentaCool.
//!
//! The agent always talks to a remote OpenAI-compatible endpoint; there is
//! exactly one provider implementation plus a config-driven constructor.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;
use tentacool_core::Provider;
use tentacool_core::error::ProviderError;

/// Build the provider from application config.
///
/// Fails when no API key is configured — the caller treats this as a
/// startup error, never a per-request one.
pub fn build_from_config(
    config: &tentacool_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config
        .model
        .api_key
        .clone()
        .ok_or_else(|| ProviderError::NotConfigured("model.api_key is not set".into()))?;

    Ok(Arc::new(OpenAiCompatProvider::new(
        "openai",
        &config.model.base_url,
        api_key,
    )))
}
