//! exploreHD Registry - device ownership and hot-plug reconciliation
//!
//! The registry owns every attached exploreHD behind a per-device async
//! mutex. Hardware work runs on the blocking pool while that mutex is
//! held. A monitor loop re-enumerates on a fixed interval and broadcasts
//! `RegistryEvent`s for devices that appear or disappear.

pub mod diff;
pub mod error;
mod monitor;
pub mod persist;
pub mod probe;
pub mod registry;
pub mod serialize;

pub use diff::DeviceDiff;
pub use error::RegistryError;
pub use probe::{DeviceProbe, V4l2Probe};
pub use registry::{DeviceRegistry, RegistryConfig, RegistryEvent, SharedDevice, BASE_PORT};
pub use serialize::serialize_device;
