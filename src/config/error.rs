//! Errors raised while resolving, reading or validating `mock-intercept.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file (`--config` or `MOCK_INTERCEPT_CONFIG`) is missing.
    #[error("no mock-intercept config at {0} (check --config or MOCK_INTERCEPT_CONFIG)")]
    NotFound(PathBuf),

    #[error("cannot read mock-intercept config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid mock-intercept config: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("cannot write mock-intercept config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A section value the server cannot run with, keyed as `section.field`.
    #[error("bad value for {key}: {message}")]
    Invalid { key: String, message: String },

    /// A `MOCK_INTERCEPT_<SECTION>_<KEY>` override that does not parse.
    #[error("override {var} rejected: {message}")]
    Env { var: String, message: String },
}

impl ConfigError {
    pub fn invalid<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::Env {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_points_at_lookup_overrides() {
        let err = ConfigError::NotFound(PathBuf::from("/tmp/absent.toml"));
        let message = err.to_string();
        assert!(message.contains("/tmp/absent.toml"));
        assert!(message.contains("MOCK_INTERCEPT_CONFIG"));
    }

    #[test]
    fn test_invalid_and_env_name_the_offending_setting() {
        let err = ConfigError::invalid("capture.max_body_bytes", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "bad value for capture.max_body_bytes: must be greater than zero"
        );

        let err = ConfigError::env("MOCK_INTERCEPT_SERVER_PORT", "Invalid port number");
        assert_eq!(
            err.to_string(),
            "override MOCK_INTERCEPT_SERVER_PORT rejected: Invalid port number"
        );
    }
}
