//! Device identity and H.264 option values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A physical capture device as reported by enumeration
///
/// All kernel video nodes that share a USB bus address are grouped into one
/// `DeviceInfo`. The `bus_info` string is the identity that survives
/// re-enumeration; node paths and positions do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Card name reported by `VIDIOC_QUERYCAP`
    pub device_name: String,
    /// USB topology string (e.g. "usb-0000:01:00.0-1.2")
    pub bus_info: String,
    /// Video node paths, naturally sorted
    pub video_node_paths: Vec<String>,
}

impl DeviceInfo {
    pub fn new(device_name: impl Into<String>, bus_info: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            bus_info: bus_info.into(),
            video_node_paths: Vec::new(),
        }
    }

    /// Whether the bus info indicates a USB attachment
    pub fn is_usb(&self) -> bool {
        self.bus_info.starts_with("usb")
    }
}

/// H.264 rate control mode of the exploreHD encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum H264Mode {
    /// Constant bitrate (not recommended for low GOP values)
    #[serde(rename = "CBR")]
    ConstantBitrate = 1,
    /// Variable bitrate (not recommended for high GOP values)
    #[serde(rename = "VBR")]
    VariableBitrate = 2,
}

impl H264Mode {
    /// Wire value sent over the extension unit
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ConstantBitrate),
            2 => Some(Self::VariableBitrate),
            _ => None,
        }
    }
}

impl Default for H264Mode {
    fn default() -> Self {
        Self::ConstantBitrate
    }
}

impl fmt::Display for H264Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstantBitrate => f.write_str("CBR"),
            Self::VariableBitrate => f.write_str("VBR"),
        }
    }
}

impl FromStr for H264Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CBR" => Ok(Self::ConstantBitrate),
            "VBR" => Ok(Self::VariableBitrate),
            other => Err(format!("unknown H.264 mode '{}'", other)),
        }
    }
}

/// Last known values of the extension-unit options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOptions {
    /// Encoder bitrate in bits per second
    pub bitrate: u32,
    /// Group of pictures; zero disables H.264 compression
    pub gop: u16,
    pub mode: H264Mode,
}
