//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_FLOW";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory under the platform config dir
const APP_DIR_NAME: &str = "serial-flow";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_FLOW_CONFIG";

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
    /// Environment variables override file values; the result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Malformed environment overrides are ignored here.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if let Err(e) = apply_env_overrides(&mut config) {
            tracing::warn!("ignoring environment override: {}", e);
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

    /// Save the current configuration to file.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or(ConfigError::Detached)?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if path is set).
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            let mut config = load_from_file(path)?;
            apply_env_overrides(&mut config)?;
            config.validate()?;
            self.config = config;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    if let Some(config_dir) = get_config_dir() {
        let app_config = config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
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

    toml::from_str(&content).map_err(ConfigError::Malformed)
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

/// Read the first set variable among `names`.
fn env_value(names: &[&str]) -> Option<(String, String)> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
}

/// Parse the first set variable among `names`.
fn env_parsed<T: FromStr>(names: &[&str], what: &'static str) -> ConfigResult<Option<T>> {
    match env_value(names) {
        Some((var, raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::bad_override(var, raw.as_str(), what)),
        None => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_FLOW_<SECTION>_<KEY>`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    let key = |suffix: &str| format!("{ENV_PREFIX}_{suffix}");

    // Port overrides
    if let Some(baud) = env_parsed(&[key("PORT_BAUD_RATE").as_str()], "baud rate")? {
        config.port.baud_rate = baud;
    }
    if let Some((var, raw)) = env_value(&[key("PORT_HANDSHAKE").as_str()]) {
        config.port.handshake = raw.parse().map_err(|_: crate::port::PortError| {
            ConfigError::bad_override(var, raw.as_str(), "handshake")
        })?;
    }
    if let Some((var, raw)) = env_value(&[key("PORT_WRITE_TIMEOUT_MS").as_str()]) {
        config.port.write_timeout_ms = match raw.trim() {
            "" | "infinite" | "none" => None,
            ms => Some(
                ms.parse()
                    .map_err(|_| ConfigError::bad_override(&var, ms, "timeout in milliseconds"))?,
            ),
        };
    }
    if let Some(size) = env_parsed(&[key("PORT_WRITE_BUFFER_SIZE").as_str()], "buffer size")? {
        config.port.write_buffer_size = size;
    }
    if let Some(size) = env_parsed(&[key("PORT_DRAIN_CHUNK_SIZE").as_str()], "chunk size")? {
        config.port.drain_chunk_size = size;
    }
    if let Some(ms) = env_parsed(&[key("PORT_LINE_POLL_INTERVAL_MS").as_str()], "interval")? {
        config.port.line_poll_interval_ms = ms;
    }

    // Timing overrides
    if let Some(attempts) = env_parsed(&[key("TIMING_ATTEMPTS").as_str()], "attempt count")? {
        config.timing.attempts = attempts;
    }
    if let Some(deviation) = env_parsed(&[key("TIMING_MAX_DEVIATION").as_str()], "deviation")? {
        config.timing.max_deviation = deviation;
    }

    // Testing overrides (also support legacy TEST_PORT etc.)
    if let Some((_, port)) = env_value(&[key("TESTING_PORT").as_str(), "TEST_PORT"]) {
        config.testing.port = Some(port);
    }
    if let Some((_, port)) = env_value(&[key("TESTING_PEER_PORT").as_str(), "TEST_PEER_PORT"]) {
        config.testing.peer_port = Some(port);
    }
    if let Some(baud) = env_parsed(&[key("TESTING_BAUD").as_str(), "TEST_BAUD"], "baud rate")? {
        config.testing.baud = baud;
    }
    if let Some(ms) = env_parsed(&[key("TESTING_TIMEOUT_MS").as_str()], "timeout")? {
        config.testing.timeout_ms = ms;
    }

    // Logging overrides
    if let Some((_, level)) = env_value(&[key("LOGGING_LEVEL").as_str()]) {
        config.logging.level = level;
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
