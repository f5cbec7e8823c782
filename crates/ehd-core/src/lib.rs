//! exploreHD Core - Shared types for camera control and streaming
//!
//! This crate provides the foundational types used across the workspace:
//! - Device identity as reported by V4L2 enumeration
//! - Pixel formats, frame sizes and frame intervals
//! - UVC control descriptors
//! - Stream configuration shared by the pipeline and the serializers
//! - The serialized device schema handed to external API layers
//! - The persisted settings document restored on startup

pub mod control;
pub mod device;
pub mod format;
pub mod schema;
pub mod settings;
pub mod stream;

pub use control::{Control, ControlFlags, ControlType, MenuItem};
pub use device::{DeviceInfo, DeviceOptions, H264Mode};
pub use format::{FourCC, Format, FormatSize, Interval};
pub use schema::{SerializedDevice, StreamState};
pub use settings::{SavedDevice, Settings, SettingsError};
pub use stream::{EncodeType, StreamEndpoint, StreamInformation, StreamType};
