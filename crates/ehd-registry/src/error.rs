use ehd_core::SettingsError;
use ehd_uvc::UvcError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error(transparent)]
    Uvc(#[from] UvcError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
