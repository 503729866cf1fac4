//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "MOCK_INTERCEPT";

/// Config file name inside the per-user config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "mock-intercept.toml";

/// Application directory under the platform config directory
const APP_DIR_NAME: &str = "mock-intercept";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "MOCK_INTERCEPT_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `MOCK_INTERCEPT_CONFIG` environment variable (explicit path)
    /// 2. `./mock-intercept.toml` (current directory)
    /// 3. `~/.config/mock-intercept/config.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\mock-intercept\config.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if apply_env_overrides(&mut config).is_err() || config.validate().is_err() {
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. XDG config directory (Linux/macOS) or APPDATA (Windows)
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    None
}

/// Get the platform-specific config directory.
fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_var(suffix: &str) -> (String, Option<String>) {
    let name = format!("{}_{}", ENV_PREFIX, suffix);
    let value = std::env::var(&name).ok();
    (name, value)
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `MOCK_INTERCEPT_<SECTION>_<KEY>`
/// For example:
/// - `MOCK_INTERCEPT_SERVER_PORT=7070`
/// - `MOCK_INTERCEPT_CAPTURE_MAX_BODY_BYTES=4096`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Server overrides
    if let (_, Some(val)) = env_var("SERVER_HOST") {
        config.server.host = val;
    }
    if let (var, Some(val)) = env_var("SERVER_PORT") {
        config.server.port = val
            .parse()
            .map_err(|_| ConfigError::env(var, "Invalid port number"))?;
    }
    if let (_, Some(val)) = env_var("SERVER_LOG_LEVEL") {
        config.server.log_level = val;
    }
    if let (var, Some(val)) = env_var("SERVER_SHUTDOWN_GRACE_MS") {
        config.server.shutdown_grace_ms = val
            .parse()
            .map_err(|_| ConfigError::env(var, "Invalid duration"))?;
    }

    // Capture overrides
    if let (var, Some(val)) = env_var("CAPTURE_MAX_BODY_BYTES") {
        config.capture.max_body_bytes = val
            .parse()
            .map_err(|_| ConfigError::env(var, "Invalid byte count"))?;
    }
    if let (var, Some(val)) = env_var("CAPTURE_MALFORMED_BODY") {
        config.capture.malformed_body = val
            .parse()
            .map_err(|msg: String| ConfigError::env(var, msg))?;
    }
    if let (_, Some(val)) = env_var("CAPTURE_WS_PLACEHOLDER") {
        config.capture.ws_placeholder = val;
    }

    // Logging overrides
    if let (var, Some(val)) = env_var("LOGGING_FORMAT") {
        config.logging.format = val
            .parse()
            .map_err(|msg: String| ConfigError::env(var, msg))?;
    }

    Ok(())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join(APP_DIR_NAME))
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}
