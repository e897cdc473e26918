//! Configuration for the sensegate service
//!
//! A TOML file in the platform config dir carries the static parts (device
//! label table, snapshot presentation). Environment variables override the
//! server fields, matching how gateway deployments are provisioned:
//! `DEBUG`, `LISTEN_ADDR`, `PORT`, `AUTH_USER`, `AUTH_PASSWORD`,
//! `HMAC_SECRET`, `BATCH_INGEST`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::snapshot::DeviceLabelMap;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Batch ingest is enabled but no HMAC secret is set")]
    MissingHmacSecret,

    #[error("Config directory not found")]
    NoDirFound,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Known devices with display labels
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable debug-level logging by default
    #[serde(default)]
    pub debug: bool,

    /// Basic credentials for the snapshot read path.
    /// With both unset, read auth is disabled.
    pub auth_user: Option<String>,
    pub auth_password: Option<String>,

    /// Shared secret for HMAC-signed batch pushes
    pub hmac_secret: Option<String>,

    /// Register the batch POST route
    #[serde(default)]
    pub batch_ingest: bool,
}

/// Snapshot presentation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Order snapshot entries newest-first
    #[serde(default)]
    pub sort_by_recency: bool,
}

/// Known device with a display label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device serial as sent in webhooks
    pub serial: String,

    /// Display label used as the snapshot key
    pub label: String,
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    crate::DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            debug: false,
            auth_user: None,
            auth_password: None,
            hmac_secret: None,
            batch_ingest: false,
        }
    }
}

impl Config {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join("sensegate"))
            .ok_or(ConfigError::NoDirFound)
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, apply environment overrides,
    /// and validate. This is what the server boots from.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific path, without environment overrides
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay environment variables onto the file-based config
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("DEBUG") {
            self.server.debug = truthy(&v);
        }
        if let Ok(v) = std::env::var("LISTEN_ADDR") {
            self.server.listen_addr = v;
        }
        if let Ok(v) = std::env::var("PORT") {
            self.server.port = v.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PORT",
                value: v.clone(),
            })?;
        }
        if let Ok(v) = std::env::var("AUTH_USER") {
            self.server.auth_user = Some(v);
        }
        if let Ok(v) = std::env::var("AUTH_PASSWORD") {
            self.server.auth_password = Some(v);
        }
        if let Ok(v) = std::env::var("HMAC_SECRET") {
            self.server.hmac_secret = Some(v);
        }
        if let Ok(v) = std::env::var("BATCH_INGEST") {
            self.server.batch_ingest = truthy(&v);
        }
        Ok(())
    }

    /// Reject configurations the server must not start with.
    ///
    /// The batch variant refuses to start unauthenticated: enabling the
    /// POST route without a shared secret is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.batch_ingest && self.server.hmac_secret.is_none() {
            return Err(ConfigError::MissingHmacSecret);
        }
        Ok(())
    }

    /// Build the snapshot label table from the device list
    pub fn label_map(&self) -> DeviceLabelMap {
        self.devices
            .iter()
            .map(|d| (d.serial.clone(), d.label.clone()))
            .collect()
    }
}

fn truthy(value: &str) -> bool {
    matches!(value, "true" | "True" | "1")
}
