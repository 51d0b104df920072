//! Deployment configuration loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `SERVITRACK_CONFIG` environment variable (path to TOML file)
//! 2. `servitrack.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded [`TrackerConfig`] is passed explicitly into the components
//! that need it. There is no global singleton: construction sites name
//! their dependencies, and tests can run with any config side by side.

pub mod defaults;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config parse error ({0}): {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("config validation failed: {0}")]
    Validation(String),
}

/// Root configuration for one hub or driver deployment.
///
/// Every field has a default matching the built-in constants, so a
/// partial file (or none at all) always yields a working config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub channel: ChannelSettings,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub reporter: ReporterSettings,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            channel: ChannelSettings::default(),
            hub: HubSettings::default(),
            reporter: ReporterSettings::default(),
        }
    }
}

/// Listener addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST API bind address. Overridable via `--api-addr`.
    #[serde(default = "default_api_addr")]
    pub api_addr: String,

    /// Channel TCP listener bind address. Overridable via `--channel-addr`.
    #[serde(default = "default_channel_addr")]
    pub channel_addr: String,
}

fn default_api_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_channel_addr() -> String {
    "0.0.0.0:9400".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_addr: default_api_addr(),
            channel_addr: default_channel_addr(),
        }
    }
}

/// Client-side channel tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_reconnect_backoff_ms() -> u64 {
    defaults::RECONNECT_BACKOFF_MS
}

fn default_connect_timeout_secs() -> u64 {
    defaults::CONNECT_TIMEOUT_SECS
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ChannelSettings {
    pub const fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Hub-side connection housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_stale_connection_secs")]
    pub stale_connection_secs: u64,
}

fn default_heartbeat_interval_secs() -> u64 {
    defaults::HEARTBEAT_INTERVAL_SECS
}

fn default_stale_connection_secs() -> u64 {
    defaults::STALE_CONNECTION_SECS
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            stale_connection_secs: default_stale_connection_secs(),
        }
    }
}

impl HubSettings {
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub const fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_connection_secs)
    }
}

/// Driver report policy tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterSettings {
    #[serde(default = "default_min_movement_meters")]
    pub min_movement_meters: f64,

    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: i64,

    #[serde(default = "default_max_silent_ms")]
    pub max_silent_ms: i64,
}

fn default_min_movement_meters() -> f64 {
    defaults::MIN_MOVEMENT_METERS
}

fn default_report_interval_ms() -> i64 {
    defaults::REPORT_INTERVAL_MS
}

fn default_max_silent_ms() -> i64 {
    defaults::MAX_SILENT_MS
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            min_movement_meters: default_min_movement_meters(),
            report_interval_ms: default_report_interval_ms(),
            max_silent_ms: default_max_silent_ms(),
        }
    }
}

impl TrackerConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SERVITRACK_CONFIG` environment variable
    /// 2. `./servitrack.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("SERVITRACK_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from SERVITRACK_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SERVITRACK_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SERVITRACK_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("servitrack.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./servitrack.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./servitrack.toml, using defaults");
                }
            }
        }

        info!("No servitrack.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would silently disable a subsystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.reconnect_backoff_ms == 0 {
            return Err(ConfigError::Validation(
                "channel.reconnect_backoff_ms must be positive".to_string(),
            ));
        }
        if self.hub.heartbeat_interval_secs >= self.hub.stale_connection_secs {
            return Err(ConfigError::Validation(format!(
                "hub.stale_connection_secs ({}) must exceed hub.heartbeat_interval_secs ({})",
                self.hub.stale_connection_secs, self.hub.heartbeat_interval_secs
            )));
        }
        if self.reporter.min_movement_meters < 0.0 {
            return Err(ConfigError::Validation(
                "reporter.min_movement_meters must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
