//! Host-launch configuration.
//!
//! The native host is whatever command the user registered — typically the
//! tutor backend's launcher script. Resolution order:
//!   1. `TUTOR_RELAY_HOST` (+ optional `TUTOR_RELAY_HOST_ARGS`), `.env` honored
//!   2. `<config dir>/tutor-relay/host.json`
//!
//! The host registration manifest itself (browser-side) is out of scope.

use serde::Deserialize;
use std::path::PathBuf;

pub const HOST_ENV: &str = "TUTOR_RELAY_HOST";
pub const HOST_ARGS_ENV: &str = "TUTOR_RELAY_HOST_ARGS";

/// How to launch the native host process.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No host configured: set {HOST_ENV} or create {0}")]
    NotConfigured(String),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Path of the JSON config file under the platform config directory.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutor-relay")
        .join("host.json")
}

impl HostConfig {
    /// Resolve the host launch configuration (env first, then file).
    pub fn load() -> Result<Self, ConfigError> {
        // Pick up a .env next to the working directory, if any.
        dotenvy::dotenv().ok();

        if let Ok(command) = std::env::var(HOST_ENV) {
            if !command.is_empty() {
                let args = std::env::var(HOST_ARGS_ENV)
                    .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default();
                log::info!("[CONFIG] Host from env: {}", command);
                return Ok(Self { command, args });
            }
        }

        let path = config_path();
        if !path.exists() {
            return Err(ConfigError::NotConfigured(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: HostConfig = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        log::info!("[CONFIG] Host from {}: {}", path.display(), config.command);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_under_tutor_relay() {
        let path = config_path();
        let s = path.to_string_lossy();
        assert!(s.contains("tutor-relay"), "Path should contain crate dir: {}", s);
        assert!(s.ends_with("host.json"), "Path should end with host.json: {}", s);
    }

    #[test]
    fn config_file_parses_with_default_args() {
        let parsed: HostConfig =
            serde_json::from_str(r#"{"command": "/usr/local/bin/tutor-host"}"#).unwrap();
        assert_eq!(parsed.command, "/usr/local/bin/tutor-host");
        assert!(parsed.args.is_empty());
    }
}
