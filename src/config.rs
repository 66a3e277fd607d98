//! Bridge configuration.
//!
//! Loaded from a JSON file or from `NODEBRIDGE_*` environment variables on
//! top of the defaults below. Every source is validated before use.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved channel for general-purpose user events.
pub const DEFAULT_EVENTS_CHANNEL: &str = "_EVENTS_";
/// `tracing` filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "nodebridge=debug,info";

pub const ENV_EVENTS_CHANNEL: &str = "NODEBRIDGE_EVENTS_CHANNEL";
pub const ENV_LOG: &str = "NODEBRIDGE_LOG";
pub const ENV_HOST_COMMAND: &str = "NODEBRIDGE_HOST_COMMAND";
pub const ENV_HOST_ARGS: &str = "NODEBRIDGE_HOST_ARGS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for a `NodeBridge` and, optionally, the host it talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_events_channel")]
    pub events_channel: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Native host process for `StdioBridge`. Not needed when the embedder
    /// supplies its own bridge.
    #[serde(default)]
    pub host: Option<HostConfig>,
}

/// Command line and environment for a spawned bridge host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl HostConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            events_channel: default_events_channel(),
            log_filter: default_log_filter(),
            host: None,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Defaults overridden by `NODEBRIDGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(channel) = non_empty(ENV_EVENTS_CHANNEL) {
            config.events_channel = channel;
        }
        if let Some(filter) = non_empty(ENV_LOG) {
            config.log_filter = filter;
        }
        if let Some(command) = non_empty(ENV_HOST_COMMAND) {
            let args: Vec<String> = non_empty(ENV_HOST_ARGS)
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            config.host = Some(HostConfig::new(command).with_args(args));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject an empty events channel or an empty host command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events_channel.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "events_channel cannot be empty".to_string(),
            ));
        }
        if let Some(host) = &self.host {
            if host.command.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "host command cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn default_events_channel() -> String {
    DEFAULT_EVENTS_CHANNEL.to_string()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_use_reserved_events_channel() {
        let config = BridgeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.events_channel, "_EVENTS_");
        assert!(config.host.is_none());
    }

    #[test]
    fn env_overrides_defaults() {
        let config = BridgeConfig::from_vars(vars(&[
            (ENV_EVENTS_CHANNEL, "custom"),
            (ENV_HOST_COMMAND, "node"),
            (ENV_HOST_ARGS, "host.js  --verbose"),
            (ENV_LOG, "  "),
        ]))
        .unwrap();

        assert_eq!(config.events_channel, "custom");
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(
            config.host,
            Some(HostConfig::new("node").with_args(["host.js", "--verbose"]))
        );
    }

    #[test]
    fn empty_events_channel_is_invalid() {
        let err = BridgeConfig::from_json_str(r#"{"events_channel": " "}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn empty_host_command_is_invalid() {
        let err = BridgeConfig::from_json_str(r#"{"host": {"command": ""}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"host": {{"command": "node", "args": ["host.js"], "env": {{"NODE_ENV": "test"}}}}}}"#
        )
        .unwrap();

        let config = BridgeConfig::from_path(file.path()).unwrap();
        let host = config.host.unwrap();
        assert_eq!(host.args, vec!["host.js".to_string()]);
        assert_eq!(host.env.get("NODE_ENV").map(String::as_str), Some("test"));
    }
}
