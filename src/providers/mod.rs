// Chat-completion provider support
//
// This module provides an abstraction layer over OpenAI-compatible
// completion APIs so the roles never deal with wire formats directly.

use async_trait::async_trait;

pub mod error;
pub mod factory;
pub mod openai;
pub mod retry;
pub mod types;

pub use error::RoleCallError;
pub use factory::create_provider;
pub use openai::OpenAIProvider;
pub use types::{ChatMessage, ProviderRequest, ProviderResponse};

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request and wait for the complete response
    async fn send_message(&self, request: &ProviderRequest)
        -> Result<ProviderResponse, RoleCallError>;

    /// Provider name (e.g. "sambanova", "openai")
    fn name(&self) -> &str;

    /// Model used when a request leaves `model` empty
    fn default_model(&self) -> &str;
}
