// OpenAI-compatible chat-completions provider
//
// SambaNova, OpenAI, Groq and most hosted inference APIs accept the same
// `/v1/chat/completions` request shape, so one client covers all of them.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::RoleCallError;
use super::retry::with_retry;
use super::types::{ChatMessage, ProviderRequest, ProviderResponse};
use super::LlmProvider;
use crate::config::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS};

/// SambaNova Cloud - the default backend for both roles.
pub const SAMBANOVA_BASE_URL: &str = "https://api.sambanova.ai";

/// Model used when a request leaves `model` empty.
const FALLBACK_MODEL: &str = "Meta-Llama-3.3-70B-Instruct";

/// OpenAI-compatible API provider
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    provider_name: String,
    max_attempts: u32,
}

impl OpenAIProvider {
    /// Create a provider for any OpenAI-compatible endpoint
    pub fn custom(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Result<Self, RoleCallError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider_name: provider_name.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Set how many attempts a request gets before failing (first try included)
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Rebuild the HTTP client with a different request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, RoleCallError> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Convert ProviderRequest to the chat-completions format
    fn to_openai_request(&self, request: &ProviderRequest) -> OpenAIRequest {
        let model = if request.model.is_empty() {
            FALLBACK_MODEL.to_string()
        } else {
            request.model.clone()
        };

        let mut messages: Vec<ChatMessage> = Vec::with_capacity(request.messages.len() + 1);

        // The system prompt travels as the first message
        if let Some(system) = &request.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(request.messages.iter().cloned());

        OpenAIRequest {
            model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            stream: false,
        }
    }

    /// Convert the API response to ProviderResponse
    fn from_openai_response(
        &self,
        response: OpenAIResponse,
    ) -> Result<ProviderResponse, RoleCallError> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            RoleCallError::InvalidResponse(format!(
                "{} returned no choices in response",
                self.provider_name
            ))
        })?;

        let text = choice.message.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(RoleCallError::InvalidResponse(format!(
                "{} returned an empty completion",
                self.provider_name
            )));
        }

        Ok(ProviderResponse {
            id: response.id,
            model: response.model,
            text,
            stop_reason: choice.finish_reason,
            provider: self.provider_name.clone(),
        })
    }

    /// One HTTP round trip; `send_message` wraps it in retry
    async fn send_message_once(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, RoleCallError> {
        let openai_request = self.to_openai_request(request);
        let url = format!("{}/v1/chat/completions", self.base_url);

        tracing::debug!(
            provider = %self.provider_name,
            model = %openai_request.model,
            messages = openai_request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&openai_request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(RoleCallError::Api {
                status: status.as_u16(),
                message: extract_error_message(&error_body),
            });
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            RoleCallError::InvalidResponse(format!("failed to decode response body: {e}"))
        })?;

        tracing::debug!(id = %openai_response.id, "Received chat completion");

        self.from_openai_response(openai_response)
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn send_message(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, RoleCallError> {
        if self.api_key.trim().is_empty() {
            return Err(RoleCallError::MissingApiKey(self.provider_name.clone()));
        }
        with_retry(self.max_attempts, || self.send_message_once(request)).await
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        FALLBACK_MODEL
    }
}

/// Pull `error.message` out of an OpenAI-style error body, falling back to
/// the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<OpenAIErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// Chat-completions API types

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}
