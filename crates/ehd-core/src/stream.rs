//! Stream configuration shared by the pipeline and the serializers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::format::{FourCC, Interval};

/// Encoded media type carried by the stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EncodeType {
    #[default]
    None,
    H264,
    Mjpg,
}

impl EncodeType {
    /// Map a V4L2 pixel format to the encode type it streams as
    pub fn from_pixel_format(pixel_format: FourCC) -> Option<Self> {
        match pixel_format {
            FourCC::H264 => Some(Self::H264),
            FourCC::MJPG => Some(Self::Mjpg),
            _ => None,
        }
    }

    pub fn pixel_format(self) -> Option<FourCC> {
        match self {
            Self::H264 => Some(FourCC::H264),
            Self::Mjpg => Some(FourCC::MJPG),
            Self::None => None,
        }
    }
}

impl fmt::Display for EncodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("NONE"),
            Self::H264 => f.write_str("H264"),
            Self::Mjpg => f.write_str("MJPG"),
        }
    }
}

impl FromStr for EncodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "H264" => Ok(Self::H264),
            "MJPG" => Ok(Self::Mjpg),
            other => Err(format!("unknown encode type '{}'", other)),
        }
    }
}

/// Network transport of the stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamType {
    None,
    #[default]
    Udp,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("NONE"),
            Self::Udp => f.write_str("UDP"),
        }
    }
}

impl FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "UDP" => Ok(Self::Udp),
            other => Err(format!("unknown stream type '{}'", other)),
        }
    }
}

/// A network destination of the stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamEndpoint {
    pub host: String,
    pub port: u16,
}

impl StreamEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for StreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything needed to derive a pipeline description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInformation {
    /// Video node the source element reads from
    pub device_path: String,
    pub encode_type: EncodeType,
    pub stream_type: StreamType,
    pub width: u32,
    pub height: u32,
    pub interval: Interval,
    /// Destinations in the order they were added
    pub endpoints: Vec<StreamEndpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_type_from_pixel_format() {
        assert_eq!(EncodeType::from_pixel_format(FourCC::H264), Some(EncodeType::H264));
        assert_eq!(EncodeType::from_pixel_format(FourCC::MJPG), Some(EncodeType::Mjpg));
        assert_eq!(EncodeType::from_pixel_format(FourCC::YUYV), None);
    }

    #[test]
    fn test_stream_enums_use_upper_case_names() {
        assert_eq!(serde_json::to_string(&EncodeType::Mjpg).unwrap(), "\"MJPG\"");
        assert_eq!(serde_json::to_string(&StreamType::Udp).unwrap(), "\"UDP\"");
        assert_eq!("H264".parse::<EncodeType>().unwrap(), EncodeType::H264);
        assert_eq!(EncodeType::Mjpg.to_string(), "MJPG");
    }
}
