//! Application state management

use anyhow::Result;
use ehd_core::Settings;
use ehd_registry::{DeviceRegistry, RegistryEvent, V4l2Probe};
use ehd_stream::GstLaunch;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;

/// Shared application state
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub config: Config,
}

impl AppState {
    /// Build the registry over the V4L2 probe described by `config`
    pub fn new(config: Config) -> Arc<Self> {
        let launcher = Arc::new(GstLaunch::new(config.stream.launcher.clone()));
        let probe = V4l2Probe::new(launcher)
            .with_ids(config.device.vendor_id.clone(), config.device.product_id.clone());
        let registry = DeviceRegistry::new(Arc::new(probe), config.to_registry_config());

        Arc::new(Self {
            registry: Arc::new(registry),
            config,
        })
    }

    /// Load the settings document and attach it so devices are restored
    /// as they are opened
    pub async fn load_settings(&self) -> Result<()> {
        let path = &self.config.daemon.settings_path;
        let settings = Settings::load_or_create(path)?;
        info!(
            path = %path.display(),
            devices = settings.devices.device.len(),
            "Loaded device settings"
        );
        self.registry.attach_settings(settings).await;
        Ok(())
    }

    pub async fn save_settings(&self) -> Result<()> {
        self.registry
            .save_settings(&self.config.daemon.settings_path)
            .await?;
        Ok(())
    }

    /// Write changed device settings once per configured period
    pub fn spawn_settings_sync(&self) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let path = self.config.daemon.settings_path.clone();
        let period = self.config.settings_sync_period();
        tokio::spawn(async move { registry.run_settings_sync(&path, period).await })
    }

    /// Log every hot-plug event until the registry goes away
    pub fn spawn_event_logger(&self) {
        let mut rx = self.registry.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(RegistryEvent::Added(devices)) => {
                        for device in devices {
                            info!(
                                device = %device.info.usb_info,
                                name = %device.info.name,
                                nickname = %device.info.nickname,
                                "Device added"
                            );
                        }
                    }
                    Ok(RegistryEvent::Removed(devices)) => {
                        for device in devices {
                            info!(device = %device.info.usb_info, "Device removed");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Event logger fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}
