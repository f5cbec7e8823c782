//! Configuration loading

use anyhow::Result;
use ehd_registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Where per-device settings are persisted
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
    /// Period of the settings sync; changes are written at most this late
    #[serde(default = "default_settings_sync")]
    pub settings_sync_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            settings_sync_ms: default_settings_sync(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("device_settings.xml")
}

fn default_settings_sync() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Time between hot-plug passes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_settle_delay() -> u64 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Program that runs pipeline descriptions
    #[serde(default = "default_launcher")]
    pub launcher: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            launcher: default_launcher(),
        }
    }
}

fn default_launcher() -> String {
    ehd_stream::GstLaunch::DEFAULT_PROGRAM.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// USB vendor id matched as an exploreHD
    #[serde(default = "default_vendor_id")]
    pub vendor_id: String,
    #[serde(default = "default_product_id")]
    pub product_id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
        }
    }
}

fn default_vendor_id() -> String {
    ehd_uvc::EHD_VENDOR_ID.to_string()
}

fn default_product_id() -> String {
    ehd_uvc::EHD_PRODUCT_ID.to_string()
}

impl Config {
    pub fn settings_sync_period(&self) -> Duration {
        Duration::from_millis(self.daemon.settings_sync_ms)
    }

    pub fn to_registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            poll_interval: Duration::from_millis(self.monitor.poll_interval_ms),
            settle_delay: Duration::from_millis(self.monitor.settle_delay_ms),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}
