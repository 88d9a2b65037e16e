// Roles - the developer and the debugger
//
// Both roles are the same capability (prompt in, text out) configured
// differently: model, temperature and system prompt. The development loop
// only sees the `Role` trait.

pub mod tasks;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::RoleConfig;
use crate::providers::{ChatMessage, LlmProvider, ProviderRequest, RoleCallError};

/// Default developer model: a reasoning model tuned for code.
pub const DEFAULT_DEVELOPER_MODEL: &str = "DeepSeek-R1-0528";

/// Default debugger model: a more deterministic reviewer.
pub const DEFAULT_DEBUGGER_MODEL: &str = "Meta-Llama-3.3-70B-Instruct";

/// Developer system prompt, embedded at compile time.
pub const DEVELOPER_PROMPT: &str = include_str!("prompts/developer.md");

/// Debugger system prompt, embedded at compile time.
pub const DEBUGGER_PROMPT: &str = include_str!("prompts/debugger.md");

/// A collaborator that turns a prompt into a completion.
#[async_trait]
pub trait Role: Send + Sync {
    /// Role name for logs ("developer", "debugger")
    fn name(&self) -> &str;

    /// Send `prompt` and return the completion text.
    async fn complete(&self, prompt: &str) -> Result<String, RoleCallError>;
}

/// Static configuration of a role.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleProfile {
    pub name: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl RoleProfile {
    pub fn developer(config: &RoleConfig) -> Self {
        Self::from_config("developer", DEFAULT_DEVELOPER_MODEL, DEVELOPER_PROMPT, config)
    }

    pub fn debugger(config: &RoleConfig) -> Self {
        Self::from_config("debugger", DEFAULT_DEBUGGER_MODEL, DEBUGGER_PROMPT, config)
    }

    fn from_config(name: &str, default_model: &str, prompt: &str, config: &RoleConfig) -> Self {
        Self {
            name: name.to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: prompt.trim().to_string(),
        }
    }
}

/// A role backed by an LLM provider.
pub struct AgentRole {
    provider: Arc<dyn LlmProvider>,
    profile: RoleProfile,
}

impl AgentRole {
    pub fn new(provider: Arc<dyn LlmProvider>, profile: RoleProfile) -> Self {
        Self { provider, profile }
    }

    fn build_request(&self, prompt: &str) -> ProviderRequest {
        ProviderRequest::new(vec![ChatMessage::user(prompt)])
            .with_model(self.profile.model.clone())
            .with_system(self.profile.system_prompt.clone())
            .with_temperature(self.profile.temperature)
            .with_max_tokens(self.profile.max_tokens)
    }
}

#[async_trait]
impl Role for AgentRole {
    fn name(&self) -> &str {
        &self.profile.name
    }

    async fn complete(&self, prompt: &str) -> Result<String, RoleCallError> {
        let request = self.build_request(prompt);

        tracing::debug!(
            role = %self.profile.name,
            provider = self.provider.name(),
            model = %self.profile.model,
            prompt_chars = prompt.len(),
            "Calling role"
        );

        let response = self.provider.send_message(&request).await?;
        if response.is_truncated() {
            tracing::warn!(
                role = %self.profile.name,
                max_tokens = self.profile.max_tokens,
                "Completion hit the token limit; output may be cut off"
            );
        }

        Ok(strip_reasoning(&response.text).to_string())
    }
}

/// Drop a leading `<think>…</think>` block emitted by reasoning models.
///
/// An unterminated block is left as-is.
pub fn strip_reasoning(text: &str) -> &str {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix("<think>") {
        if let Some(end) = rest.find("</think>") {
            return rest[end + "</think>".len()..].trim();
        }
    }
    text.trim()
}
