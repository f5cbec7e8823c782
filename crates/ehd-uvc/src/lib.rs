//! exploreHD UVC - capture devices and the H.264 extension unit
//!
//! This crate talks to the kernel directly:
//! - Enumeration of `/sys/class/video4linux` grouped by USB bus
//! - `Camera`: one opened video node with its formats
//! - `CaptureDevice`: the cameras of one physical device, its controls,
//!   sysfs attributes, and stream pipeline
//! - `ControlChannel`: the vendor extension-unit command protocol
//! - `ControlledCamera`: bitrate, GOP and rate-control mode of an exploreHD

pub mod camera;
pub mod device;
pub mod ehd;
pub mod enumerate;
pub mod error;
mod sys;
pub mod xu;

pub use camera::Camera;
pub use device::CaptureDevice;
pub use ehd::{ControlledCamera, H264Options, OptionKind};
pub use enumerate::{list_devices, natural_cmp};
pub use error::UvcError;
pub use xu::{ByteOrder, ControlChannel, Unit, WireValue, XuTransport};

/// USB vendor id of the exploreHD
pub const EHD_VENDOR_ID: &str = "0c45";
/// USB product id of the exploreHD
pub const EHD_PRODUCT_ID: &str = "6366";
