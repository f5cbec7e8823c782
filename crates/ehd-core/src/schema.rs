//! Serialized device schema
//!
//! These are the JSON shapes handed to whatever API layer sits in front of
//! the registry. They are built from the live device state and never read
//! back, so only the field names and nesting matter here.

use serde::{Deserialize, Serialize};

use crate::control::{Control, ControlType, MenuItem};
use crate::device::{DeviceOptions, H264Mode};
use crate::format::{Format, Interval};
use crate::stream::{EncodeType, StreamEndpoint, StreamInformation, StreamType};

/// One exploreHD device as seen by API clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedDevice {
    pub info: SerializedInfo,
    pub options: SerializedOptions,
    pub cameras: Vec<SerializedCamera>,
    pub controls: Vec<SerializedControl>,
    pub stream: StreamState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedInfo {
    /// sysfs path of the USB device
    pub path: String,
    pub name: String,
    pub vendor_id: String,
    pub product_id: String,
    pub usb_info: String,
    pub nickname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SerializedOptions {
    pub bitrate: u32,
    pub mode: H264Mode,
    pub gop: u16,
}

impl From<DeviceOptions> for SerializedOptions {
    fn from(options: DeviceOptions) -> Self {
        Self {
            bitrate: options.bitrate,
            mode: options.mode,
            gop: options.gop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedCamera {
    pub device_path: String,
    pub formats: Vec<Format>,
}

/// Flag block of a serialized control, which also carries the numeric range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedControlFlags {
    pub disabled: bool,
    pub grabbed: bool,
    pub read_only: bool,
    pub update: bool,
    pub slider: bool,
    pub write_only: bool,
    pub volatile: bool,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub max: i32,
    pub min: i32,
    pub step: i32,
    pub default_value: i32,
}

/// Menu entries are flattened to their name or integer value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerializedMenuEntry {
    Name(String),
    Value(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedControl {
    pub id: u32,
    pub name: String,
    /// Current value, or null when the read failed
    pub value: Option<i32>,
    pub flags: SerializedControlFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<Vec<SerializedMenuEntry>>,
}

impl SerializedControl {
    pub fn new(control: &Control, value: Option<i32>) -> Self {
        let menu = if control.menu.is_empty() {
            None
        } else {
            Some(
                control
                    .menu
                    .iter()
                    .map(|item| match item {
                        MenuItem::Named { name, .. } => SerializedMenuEntry::Name(name.clone()),
                        MenuItem::Integer { value, .. } => SerializedMenuEntry::Value(*value),
                    })
                    .collect(),
            )
        };

        Self {
            id: control.id,
            name: control.name.clone(),
            value,
            flags: SerializedControlFlags {
                disabled: control.flags.disabled,
                grabbed: control.flags.grabbed,
                read_only: control.flags.read_only,
                update: control.flags.update,
                slider: control.flags.slider,
                write_only: control.flags.write_only,
                volatile: control.flags.volatile,
                control_type: control.control_type,
                max: control.max,
                min: control.min,
                step: control.step,
                default_value: control.default_value,
            },
            menu,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedStreamFormat {
    pub width: u32,
    pub height: u32,
    pub interval: Interval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub device_path: String,
    pub endpoints: Vec<StreamEndpoint>,
    pub encode_type: EncodeType,
    pub stream_type: StreamType,
    pub format: SerializedStreamFormat,
}

impl From<&StreamInformation> for StreamSnapshot {
    fn from(info: &StreamInformation) -> Self {
        Self {
            device_path: info.device_path.clone(),
            endpoints: info.endpoints.clone(),
            encode_type: info.encode_type,
            stream_type: info.stream_type,
            format: SerializedStreamFormat {
                width: info.width,
                height: info.height,
                interval: info.interval,
            },
        }
    }
}

/// Stream block; an unconfigured pipeline serializes as `{}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamState {
    Configured(StreamSnapshot),
    Unconfigured {},
}

impl StreamState {
    pub fn from_pipeline(configured: bool, info: &StreamInformation) -> Self {
        if configured {
            Self::Configured(StreamSnapshot::from(info))
        } else {
            Self::Unconfigured {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlFlags;
    use serde_json::json;

    fn menu_control() -> Control {
        Control {
            id: 0x0098_0918,
            name: "Power Line Frequency".to_string(),
            flags: ControlFlags::default(),
            control_type: ControlType::Menu,
            min: 0,
            max: 2,
            step: 1,
            default_value: 1,
            menu: vec![
                MenuItem::Named {
                    index: 0,
                    name: "Disabled".to_string(),
                },
                MenuItem::Named {
                    index: 1,
                    name: "50 Hz".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_unconfigured_stream_is_empty_object() {
        let state = StreamState::from_pipeline(false, &StreamInformation::default());
        assert_eq!(serde_json::to_value(&state).unwrap(), json!({}));
    }

    #[test]
    fn test_configured_stream_shape() {
        let info = StreamInformation {
            device_path: "/dev/video2".to_string(),
            encode_type: EncodeType::H264,
            stream_type: StreamType::Udp,
            width: 1920,
            height: 1080,
            interval: Interval::new(1, 30),
            endpoints: vec![StreamEndpoint::new("127.0.0.1", 5600)],
        };
        let value = serde_json::to_value(StreamState::from_pipeline(true, &info)).unwrap();
        assert_eq!(
            value,
            json!({
                "device_path": "/dev/video2",
                "endpoints": [{"host": "127.0.0.1", "port": 5600}],
                "encode_type": "H264",
                "stream_type": "UDP",
                "format": {
                    "width": 1920,
                    "height": 1080,
                    "interval": {"numerator": 1, "denominator": 30}
                }
            })
        );
    }

    #[test]
    fn test_control_menu_flattened() {
        let control = SerializedControl::new(&menu_control(), Some(1));
        let value = serde_json::to_value(&control).unwrap();
        assert_eq!(value["menu"], json!(["Disabled", "50 Hz"]));
        assert_eq!(value["flags"]["type"], 3);
        assert_eq!(value["flags"]["default_value"], 1);
        assert_eq!(value["value"], 1);
    }

    #[test]
    fn test_control_without_menu_omits_key() {
        let mut control = menu_control();
        control.control_type = ControlType::Integer;
        control.menu.clear();
        let value = serde_json::to_value(SerializedControl::new(&control, None)).unwrap();
        assert!(value.get("menu").is_none());
        assert!(value["value"].is_null());
    }
}
