// Role call errors - everything that can go wrong talking to a completion API

use std::time::Duration;
use thiserror::Error;

/// Failure of a single Generation Role or Review Role invocation.
///
/// The development loop never retries these; they end the run with a
/// `Failed` result. Transport-level retry happens inside the provider, below
/// the loop, and only for errors where [`RoleCallError::is_retryable`] holds.
#[derive(Debug, Error)]
pub enum RoleCallError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Role call timed out after {0:?}")]
    Timeout(Duration),

    #[error("No API key configured for provider '{0}' (set SAMBANOVA_API_KEY or provider.api_key)")]
    MissingApiKey(String),
}

impl RoleCallError {
    /// Check if the transport should try again
    pub fn is_retryable(&self) -> bool {
        match self {
            RoleCallError::Network(_) => true,
            RoleCallError::Timeout(_) => true,
            RoleCallError::Api { status, .. } => *status == 429 || *status >= 500,
            RoleCallError::InvalidResponse(_) => false,
            RoleCallError::MissingApiKey(_) => false,
        }
    }
}
