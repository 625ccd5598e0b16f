//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dashboard.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SourceConfig: Where the device document lives (base url, device id, timeout).
//!     - PollingConfig: How often the source is polled, when it counts as unreachable.
//!     - HistoryConfig: How many readings the charts keep.
//!     - ThresholdConfig: Rain sensor wet/dry cut-off.
//!     - ServerConfig: Dashboard bind address.
//!     - LoggingConfig: Log level and per-reading output.
//!
//! every section is optional; missing keys take the defaults below.
//!
//! ==============================================================================

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub source: SourceConfig,
    pub polling: PollingConfig,
    pub history: HistoryConfig,
    pub thresholds: ThresholdConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// endpoint root, e.g. a firebase realtime database url
    pub base_url: String,
    pub device_id: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    /// consecutive failed fetches before the dashboard flags the source
    pub unreachable_after: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThresholdConfig {
    /// rain readings strictly below this are "wet"
    pub rain_wet_threshold: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://iot-1-59a09-default-rtdb.asia-southeast1.firebasedatabase.app"
                .to_string(),
            device_id: "esp32_01".to_string(),
            timeout_seconds: 5,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: 3, unreachable_after: 3 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { size: 20 }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { rain_wet_threshold: 500 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl DashboardConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        Self::from_toml(&content)
    }

    /// Parse and validate a config document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DashboardConfig = toml::from_str(content)
            .map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the explicit path if given, otherwise search the usual
    /// locations and fall back to defaults.
    ///
    /// An explicit path that fails to load is an error; a broken file found
    /// by the search is only a warning.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            tracing::info!("[CONFIG] Loaded from {}", path.display());
            return Ok(config);
        }

        let paths = [
            PathBuf::from("config").join("dashboard.toml"),
            PathBuf::from("..").join("config").join("dashboard.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("[CONFIG] Loaded from {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("[CONFIG] Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::warn!("[CONFIG] No config file found - using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.base_url.trim().is_empty() {
            bail!("source.base_url must not be empty");
        }
        if self.source.device_id.trim().is_empty() {
            bail!("source.device_id must not be empty");
        }
        if self.source.timeout_seconds == 0 {
            bail!("source.timeout_seconds must be at least 1");
        }
        if self.polling.interval_seconds == 0 {
            bail!("polling.interval_seconds must be at least 1");
        }
        if self.history.size == 0 {
            bail!("history.size must be at least 1");
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│        DASHBOARD CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Source: {}", self.source.base_url);
        println!("│ Device: {}", self.source.device_id);
        println!("│ Poll Interval: {}s", self.polling.interval_seconds);
        println!("│ History Size: {}", self.history.size);
        println!("│ Rain Wet Below: {}", self.thresholds.rain_wet_threshold);
        println!("│ Bind: {}", self.server.bind);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
