// Project-wide constants
//
// Centralised here so port numbers and other magic values have one
// source of truth. Import via `use crate::config::constants::*;`.

/// Default bind address for the HTTP server (all interfaces, for hosted
/// deployments behind a proxy). `PORT` replaces the port part.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";

/// Iteration budget used when a request does not name one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Upper bound applied to client-requested iteration budgets.
pub const DEFAULT_MAX_ITERATIONS_LIMIT: u32 = 10;

/// Default maximum tokens per role completion.
pub const DEFAULT_MAX_TOKENS: u32 = 8000;

/// Default sampling temperature for both roles.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default per-call timeout enforced by the development loop.
pub const DEFAULT_ROLE_TIMEOUT_SECS: u64 = 300;

/// Default HTTP client timeout for a single completion request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default attempts per completion request (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Request bodies above this size are rejected.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Directory under $HOME holding `config.toml`.
pub const CONFIG_DIR_NAME: &str = ".crewloop";
