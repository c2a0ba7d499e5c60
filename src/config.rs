//! Runtime settings read from the environment.
//!
//! | Variable                  | Meaning                                   | Default  |
//! |---------------------------|-------------------------------------------|----------|
//! | `ACLTOOL_LOG`             | tracing filter (falls back to `RUST_LOG`) | `warn`   |
//! | `ACLTOOL_OUTPUT`          | `text` or `json`                          | `text`   |
//! | `ACLTOOL_EVENT_NAMESPACE` | prefix for unqualified event names        | `Global` |

use thiserror::Error;

use crate::orchestrator::DEFAULT_EVENT_NAMESPACE;

pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid ACLTOOL_OUTPUT value '{0}' (expected text or json)")]
    InvalidOutput(String),

    #[error("invalid ACLTOOL_EVENT_NAMESPACE value '{0}' (must be non-empty and contain no backslash)")]
    InvalidNamespace(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_filter: String,
    pub output: OutputFormat,
    pub event_namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            output: OutputFormat::Text,
            event_namespace: DEFAULT_EVENT_NAMESPACE.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let log_filter = lookup("ACLTOOL_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let output = match lookup("ACLTOOL_OUTPUT") {
            None => OutputFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("text") => OutputFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("json") => OutputFormat::Json,
            Some(v) => return Err(ConfigError::InvalidOutput(v)),
        };

        let event_namespace = match lookup("ACLTOOL_EVENT_NAMESPACE") {
            None => DEFAULT_EVENT_NAMESPACE.to_string(),
            Some(v) if v.is_empty() || v.contains('\\') => return Err(ConfigError::InvalidNamespace(v)),
            Some(v) => v,
        };

        Ok(Config { log_filter, output, event_namespace })
    }
}
