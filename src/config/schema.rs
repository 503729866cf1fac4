//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,
    /// Request capture configuration
    pub capture: CaptureConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values that serde alone cannot reject.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.capture.validate()
    }
}

/// Listener configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port number; 0 asks the OS for a free port
    pub port: u16,
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub log_level: String,
    /// How long `close()` waits for in-flight connections before aborting
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7070,
            log_level: "info".to_string(),
            shutdown_grace_ms: 500,
        }
    }
}

impl ServerConfig {
    /// Get the shutdown grace period as Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("server.host", "must not be empty"));
        }
        Ok(())
    }
}

/// What to do with a non-empty body that is not valid JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedBodyPolicy {
    /// Hand the observer a `CapturedBody::Malformed` carrying the raw bytes
    #[default]
    Deliver,
    /// Discard the capture and leave the observer armed
    Drop,
}

impl std::str::FromStr for MalformedBodyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deliver" => Ok(Self::Deliver),
            "drop" => Ok(Self::Drop),
            other => Err(format!("unknown malformed body policy '{other}'")),
        }
    }
}

/// Request capture configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Upper bound on buffered HTTP body bytes
    pub max_body_bytes: usize,
    /// Handling of bodies that fail JSON decoding
    pub malformed_body: MalformedBodyPolicy,
    /// Text frame sent to every WebSocket client before the server closes
    pub ws_placeholder: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            malformed_body: MalformedBodyPolicy::Deliver,
            ws_placeholder: "{}".to_string(),
        }
    }
}

impl CaptureConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::invalid(
                "capture.max_body_bytes",
                "must be greater than zero",
            ));
        }
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&self.ws_placeholder) {
            return Err(ConfigError::invalid(
                "capture.ws_placeholder",
                format!("must be valid JSON: {e}"),
            ));
        }
        Ok(())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
