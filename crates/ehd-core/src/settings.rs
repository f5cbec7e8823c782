//! Persisted device settings
//!
//! Settings are stored as a small XML document keyed by the USB bus info of
//! each device. The registry restores a device from its record when the
//! device appears and upserts a fresh record on save.

use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::device::{DeviceOptions, H264Mode};
use crate::format::Interval;
use crate::stream::{EncodeType, StreamEndpoint, StreamInformation, StreamType};

pub const SETTINGS_VERSION: &str = "1.0";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to parse settings: {0}")]
    ParseError(String),
    #[error("Failed to serialize settings: {0}")]
    SerializeError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedOptions {
    #[serde(rename = "@bitrate")]
    pub bitrate: u32,
    #[serde(rename = "@mode")]
    pub mode: u8,
    #[serde(rename = "@gop")]
    pub gop: u16,
}

impl From<DeviceOptions> for SavedOptions {
    fn from(options: DeviceOptions) -> Self {
        Self {
            bitrate: options.bitrate,
            mode: options.mode.as_u8(),
            gop: options.gop,
        }
    }
}

impl SavedOptions {
    pub fn to_options(&self) -> Result<DeviceOptions, SettingsError> {
        let mode = H264Mode::from_u8(self.mode).ok_or(SettingsError::InvalidValue {
            field: "mode",
            value: self.mode.to_string(),
        })?;
        Ok(DeviceOptions {
            bitrate: self.bitrate,
            gop: self.gop,
            mode,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedControl {
    #[serde(rename = "@id")]
    pub id: u32,
    #[serde(rename = "@value")]
    pub value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedControls {
    #[serde(rename = "Control", default)]
    pub control: Vec<SavedControl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEndpoint {
    #[serde(rename = "@host")]
    pub host: String,
    #[serde(rename = "@port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEndpoints {
    #[serde(rename = "Endpoint", default)]
    pub endpoint: Vec<SavedEndpoint>,
}

/// Stream configuration minus the device path, which changes between boots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedStream {
    #[serde(rename = "@encodeType")]
    pub encode_type: String,
    #[serde(rename = "@streamType")]
    pub stream_type: String,
    #[serde(rename = "@width")]
    pub width: u32,
    #[serde(rename = "@height")]
    pub height: u32,
    #[serde(rename = "@numerator")]
    pub numerator: u32,
    #[serde(rename = "@denominator")]
    pub denominator: u32,
    #[serde(rename = "Endpoints", default)]
    pub endpoints: SavedEndpoints,
}

impl From<&StreamInformation> for SavedStream {
    fn from(info: &StreamInformation) -> Self {
        Self {
            encode_type: info.encode_type.to_string(),
            stream_type: info.stream_type.to_string(),
            width: info.width,
            height: info.height,
            numerator: info.interval.numerator,
            denominator: info.interval.denominator,
            endpoints: SavedEndpoints {
                endpoint: info
                    .endpoints
                    .iter()
                    .map(|e| SavedEndpoint {
                        host: e.host.clone(),
                        port: e.port,
                    })
                    .collect(),
            },
        }
    }
}

impl SavedStream {
    pub fn encode_type(&self) -> Result<EncodeType, SettingsError> {
        self.encode_type
            .parse()
            .map_err(|_| SettingsError::InvalidValue {
                field: "encodeType",
                value: self.encode_type.clone(),
            })
    }

    pub fn stream_type(&self) -> Result<StreamType, SettingsError> {
        self.stream_type
            .parse()
            .map_err(|_| SettingsError::InvalidValue {
                field: "streamType",
                value: self.stream_type.clone(),
            })
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.numerator, self.denominator)
    }

    pub fn endpoints(&self) -> Vec<StreamEndpoint> {
        self.endpoints
            .endpoint
            .iter()
            .map(|e| StreamEndpoint::new(e.host.clone(), e.port))
            .collect()
    }
}

/// Settings record of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedDevice {
    #[serde(rename = "@usbInfo")]
    pub usb_info: String,
    #[serde(rename = "@nickname", default)]
    pub nickname: String,
    #[serde(rename = "@savedAt", default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(rename = "Options")]
    pub options: SavedOptions,
    #[serde(rename = "Controls", default)]
    pub controls: SavedControls,
    #[serde(rename = "Stream", default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<SavedStream>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedDevices {
    #[serde(rename = "Device", default)]
    pub device: Vec<SavedDevice>,
}

/// Root settings document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Settings")]
pub struct Settings {
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "Devices", default)]
    pub devices: SavedDevices,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self {
            version: SETTINGS_VERSION.to_string(),
            devices: SavedDevices::default(),
        }
    }

    pub fn from_xml(xml: &str) -> Result<Self, SettingsError> {
        from_str(xml).map_err(|e| SettingsError::ParseError(e.to_string()))
    }

    pub fn to_xml(&self) -> Result<String, SettingsError> {
        let xml = to_string(self).map_err(|e| SettingsError::SerializeError(e.to_string()))?;
        Ok(format!("<?xml version='1.0'?>\n{}", xml))
    }

    /// Load the settings file, writing an empty document if it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings = Self::from_xml(&content)?;
            debug!(
                path = %path.display(),
                devices = settings.devices.device.len(),
                "Loaded settings"
            );
            return Ok(settings);
        }

        info!(path = %path.display(), "Creating settings file");
        let settings = Self::new();
        settings.save(path)?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_xml()?)?;
        Ok(())
    }

    pub fn find(&self, usb_info: &str) -> Option<&SavedDevice> {
        self.devices.device.iter().find(|d| d.usb_info == usb_info)
    }

    /// Whether the stored record for this device equals `record`,
    /// ignoring when it was saved
    pub fn is_current(&self, record: &SavedDevice) -> bool {
        self.find(&record.usb_info).is_some_and(|stored| {
            let stored = SavedDevice {
                saved_at: record.saved_at,
                ..stored.clone()
            };
            stored == *record
        })
    }

    /// Replace the record with the same usb info, or append a new one
    pub fn upsert(&mut self, mut record: SavedDevice) {
        if record.saved_at.is_none() {
            record.saved_at = Some(Utc::now());
        }
        match self
            .devices
            .device
            .iter_mut()
            .find(|d| d.usb_info == record.usb_info)
        {
            Some(existing) => *existing = record,
            None => self.devices.device.push(record),
        }
    }
}
