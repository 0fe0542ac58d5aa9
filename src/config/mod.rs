//! Configuration module for weighit
//!
//! This module handles kiosk configuration:
//! - Where the donation database lives
//! - Which USB scale to open and how to poll it
//!
//! # App Data Location
//!
//! Everything lives under `~/weighit/`:
//!
//! - `weigh.db` - the donation database
//! - `weighit.toml` - optional configuration file
//! - `logs/` - rolling log files written by the binary
//!
//! # Overrides
//!
//! - `WEIGHIT_DB_PATH` - database file, takes precedence over the config file
//! - `WEIGHIT_CONFIG` - alternate configuration file
//!
//! # Example
//!
//! ```ignore
//! use weighit::config::AppConfig;
//!
//! let config = AppConfig::load_or_default();
//! let store = LogStore::open(&config.database)?;
//! let scale = ScaleReader::open(&config.scale)?;
//! ```

use crate::error::{Result, WeighError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the user's home
pub const APP_DIR_NAME: &str = "weighit";

/// Database filename
pub const DB_FILE: &str = "weigh.db";

/// Config filename
pub const CONFIG_FILE: &str = "weighit.toml";

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "WEIGHIT_DB_PATH";

/// Environment variable overriding the config file path
pub const CONFIG_PATH_ENV: &str = "WEIGHIT_CONFIG";

/// Default scale vendor id
pub const DEFAULT_VENDOR_ID: u16 = 0x1018;

/// Default scale product id
pub const DEFAULT_PRODUCT_ID: u16 = 0x1006;

/// Default blocking read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 250;

/// Default backoff after a transport error in milliseconds
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

/// Default stabilization polling interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default stabilization timeout in milliseconds
pub const DEFAULT_STABLE_TIMEOUT_MS: u64 = 2000;

/// Default SQLite busy timeout in milliseconds
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

// ==================== App Data Directory ====================

/// Get the application directory path (`~/weighit`)
pub fn app_dir() -> Option<PathBuf> {
    dirs_next::home_dir().map(|p| p.join(APP_DIR_NAME))
}

/// Ensure the app directory exists
pub fn ensure_app_dir() -> Result<PathBuf> {
    let dir = app_dir().ok_or_else(|| {
        WeighError::Config("Could not determine home directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            WeighError::Config(format!("Failed to create app directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the config file, honoring `WEIGHIT_CONFIG`
pub fn config_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => app_dir().map(|p| p.join(CONFIG_FILE)),
    }
}

// ==================== Database ====================

/// Database settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; `None` means `~/weighit/weigh.db`
    pub path: Option<PathBuf>,
    /// How long a connection waits on a locked database
    pub busy_timeout_ms: u64,
    /// Schema script to run on a fresh database; `None` uses the bundled one
    pub schema_path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            schema_path: None,
        }
    }
}

impl DatabaseConfig {
    /// Settings pointing at a specific database file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Resolve the database file: `WEIGHIT_DB_PATH`, then `path`, then the default
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(env_path) = std::env::var_os(DB_PATH_ENV) {
            if !env_path.is_empty() {
                return Ok(PathBuf::from(env_path));
            }
        }
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        app_dir()
            .map(|dir| dir.join(DB_FILE))
            .ok_or_else(|| WeighError::Config("Could not determine home directory".to_string()))
    }

    /// Busy timeout as a duration
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

// ==================== Scale ====================

/// USB scale settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
    /// Timeout for each blocking read; bounds shutdown latency
    pub read_timeout_ms: u64,
    /// Sleep after a transport error before retrying
    pub retry_backoff_ms: u64,
    /// Interval between checks while waiting for a stable reading
    pub poll_interval_ms: u64,
    /// How long to wait for a stable reading
    pub stable_timeout_ms: u64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            stable_timeout_ms: DEFAULT_STABLE_TIMEOUT_MS,
        }
    }
}

impl ScaleConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn stable_timeout(&self) -> Duration {
        Duration::from_millis(self.stable_timeout_ms)
    }
}

// ==================== App Config ====================

/// Complete kiosk configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scale: ScaleConfig,
}

impl AppConfig {
    /// Load from the default location
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            WeighError::Config("Could not determine config file path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content)
            .map_err(|e| WeighError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Load from the default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to a specific file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WeighError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}
