//! Configuration module for mock-intercept.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `MOCK_INTERCEPT_CONFIG` environment variable (explicit path)
//! 2. `./mock-intercept.toml` (current directory)
//! 3. `~/.config/mock-intercept/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\mock-intercept\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `MOCK_INTERCEPT_<SECTION>_<KEY>`, for example:
//! - `MOCK_INTERCEPT_SERVER_PORT=7070`
//! - `MOCK_INTERCEPT_CAPTURE_MALFORMED_BODY=drop`
//! - `MOCK_INTERCEPT_LOGGING_FORMAT=json`
//!
//! # Example
//!
//! ```rust,ignore
//! use mock_intercept::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("Listening port: {}", loader.config().server.port);
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    CaptureConfig, Config, LogFormat, LoggingConfig, MalformedBodyPolicy, ServerConfig,
};
