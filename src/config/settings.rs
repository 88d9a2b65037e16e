// Configuration structs

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::constants::*;
use crate::providers::openai::SAMBANOVA_BASE_URL;

/// Top-level configuration, one field per `config.toml` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub developer: RoleConfig,
    pub debugger: RoleConfig,
    #[serde(rename = "loop")]
    pub run_loop: LoopSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000")
    pub bind_address: String,
    /// Client-requested `max_iterations` is clamped to this value
    pub max_iterations_limit: u32,
    /// Maximum accepted request body size in bytes
    pub body_limit_bytes: usize,
    /// Per-IP request rate for `/generate`; `None` disables limiting
    pub rate_limit_per_second: Option<f64>,
    /// Burst capacity for the rate limiter
    pub rate_limit_burst: u32,
    /// Key rate-limit buckets by `X-Forwarded-For`; enable only behind a
    /// proxy that sets the header
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_HTTP_ADDR.to_string(),
            max_iterations_limit: DEFAULT_MAX_ITERATIONS_LIMIT,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            rate_limit_per_second: None,
            rate_limit_burst: 5,
            trust_forwarded_for: false,
        }
    }
}

/// Chat-completions endpoint shared by both roles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Display name used in logs (e.g., "sambanova", "groq")
    pub name: String,
    /// Bearer token; may be empty until the first role call
    pub api_key: String,
    /// Base URL without the `/v1/chat/completions` suffix
    pub base_url: String,
    /// HTTP timeout for one completion request
    pub request_timeout_secs: u64,
    /// Attempts per completion request, first try included
    pub max_attempts: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "sambanova".to_string(),
            api_key: String::new(),
            base_url: SAMBANOVA_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Per-role model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// Model name; `None` uses the role's built-in default
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Development loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// Budget used when a request omits `max_iterations`
    pub default_max_iterations: u32,
    /// Per-call timeout for developer and debugger calls; 0 disables it
    pub role_timeout_secs: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            default_max_iterations: DEFAULT_MAX_ITERATIONS,
            role_timeout_secs: DEFAULT_ROLE_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Reject settings the server and loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_iterations_limit == 0 {
            bail!("server.max_iterations_limit must be at least 1");
        }
        if self.run_loop.default_max_iterations == 0 {
            bail!("loop.default_max_iterations must be at least 1");
        }
        if self.run_loop.default_max_iterations > self.server.max_iterations_limit {
            bail!(
                "loop.default_max_iterations ({}) exceeds server.max_iterations_limit ({})",
                self.run_loop.default_max_iterations,
                self.server.max_iterations_limit
            );
        }
        if self.provider.max_attempts == 0 {
            bail!("provider.max_attempts must be at least 1");
        }
        if self.provider.base_url.trim().is_empty() {
            bail!("provider.base_url must not be empty");
        }
        if let Some(rate) = self.server.rate_limit_per_second {
            if rate.is_nan() || rate <= 0.0 {
                bail!("server.rate_limit_per_second must be positive");
            }
            if self.server.rate_limit_burst == 0 {
                bail!("server.rate_limit_burst must be at least 1");
            }
        }
        for (section, role) in [("developer", &self.developer), ("debugger", &self.debugger)] {
            if !(0.0..=2.0).contains(&role.temperature) {
                bail!("{section}.temperature must be between 0.0 and 2.0");
            }
            if role.max_tokens == 0 {
                bail!("{section}.max_tokens must be at least 1");
            }
        }
        Ok(())
    }

    /// Request budget after defaulting and clamping.
    pub fn effective_max_iterations(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.run_loop.default_max_iterations)
            .min(self.server.max_iterations_limit)
    }

    /// Copy safe to print: the API key is replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.provider.api_key = if self.provider.api_key.is_empty() {
            "(not set)".to_string()
        } else {
            "(set)".to_string()
        };
        copy
    }

    /// Render as TOML for the `config` subcommand.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
