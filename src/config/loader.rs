// Configuration loader
// Reads ~/.crewloop/config.toml (or an explicit path), then applies
// environment overrides

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::CONFIG_DIR_NAME;
use super::settings::Config;

/// Default config location: `~/.crewloop/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join("config.toml"))
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, the default location is used
/// when present and built-in defaults otherwise. A `.env` file in the working
/// directory is loaded first so its values reach the environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Ok(env_path) = dotenvy::dotenv() {
        tracing::debug!(path = %env_path.display(), "Loaded .env file");
    }

    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => match default_config_path() {
            Some(default) if default.exists() => load_config_file(&default)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Parse one TOML config file. Missing sections fall back to defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Empty values are ignored. `CREWLOOP_BIND` wins over `PORT`; `PORT` alone
/// keeps the configured host and replaces the port.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(key) = get("SAMBANOVA_API_KEY") {
        config.provider.api_key = key;
    }
    if let Some(url) = get("CREWLOOP_BASE_URL") {
        config.provider.base_url = url;
    }
    if let Some(model) = get("CREWLOOP_DEVELOPER_MODEL") {
        config.developer.model = Some(model);
    }
    if let Some(model) = get("CREWLOOP_DEBUGGER_MODEL") {
        config.debugger.model = Some(model);
    }

    if let Some(bind) = get("CREWLOOP_BIND") {
        config.server.bind_address = bind;
    } else if let Some(port) = get("PORT") {
        match port.trim().parse::<u16>() {
            Ok(port) => {
                let host = config
                    .server
                    .bind_address
                    .rsplit_once(':')
                    .map(|(host, _)| host.to_string())
                    .unwrap_or_else(|| "0.0.0.0".to_string());
                config.server.bind_address = format!("{host}:{port}");
            }
            Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT value"),
        }
    }
}
