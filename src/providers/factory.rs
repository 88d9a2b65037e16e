// Provider factory
//
// Creates the shared provider from the `[provider]` config section

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use super::openai::OpenAIProvider;
use super::LlmProvider;
use crate::config::ProviderConfig;

/// Create the provider both roles talk to.
///
/// An empty API key is accepted here; the first role call then fails with
/// `RoleCallError::MissingApiKey`, which surfaces as a run error instead of
/// keeping the server from starting.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    if config.api_key.trim().is_empty() {
        tracing::warn!(
            provider = %config.name,
            "No API key configured; generation requests will fail until one is set"
        );
    }

    let provider = OpenAIProvider::custom(
        config.api_key.clone(),
        config.base_url.clone(),
        config.name.clone(),
    )
    .context("Failed to create HTTP client")?
    .with_max_attempts(config.max_attempts)
    .with_request_timeout(Duration::from_secs(config.request_timeout_secs))
    .context("Failed to configure request timeout")?;

    Ok(Arc::new(provider))
}
