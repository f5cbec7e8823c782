//! Pixel formats, frame sizes and frame intervals

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// V4L2 pixel format code
///
/// V4L2 packs the four characters little-endian regardless of host byte
/// order, so the conversions here are explicit rather than native. Bit 31
/// marks a big-endian variant of the format and is rendered as a `-BE`
/// suffix.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub u32);

impl FourCC {
    pub const H264: FourCC = FourCC::new(b"H264");
    pub const MJPG: FourCC = FourCC::new(b"MJPG");
    pub const YUYV: FourCC = FourCC::new(b"YUYV");

    const BIG_ENDIAN_FLAG: u32 = 1 << 31;

    pub const fn new(code: &[u8; 4]) -> Self {
        Self(
            (code[0] as u32)
                | (code[1] as u32) << 8
                | (code[2] as u32) << 16
                | (code[3] as u32) << 24,
        )
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub fn is_big_endian(self) -> bool {
        self.0 & Self::BIG_ENDIAN_FLAG != 0
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.0
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.to_le_bytes() {
            write!(f, "{}", (byte & 0x7f) as char)?;
        }
        if self.is_big_endian() {
            f.write_str("-BE")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FourCC")
            .field(&format_args!("{}", self))
            .finish()
    }
}

impl FromStr for FourCC {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, big_endian) = match s.strip_suffix("-BE") {
            Some(code) => (code, true),
            None => (s, false),
        };
        let bytes: [u8; 4] = code
            .as_bytes()
            .try_into()
            .map_err(|_| format!("invalid fourcc '{}'", s))?;
        let mut fourcc = FourCC::new(&bytes);
        if big_endian {
            fourcc.0 |= Self::BIG_ENDIAN_FLAG;
        }
        Ok(fourcc)
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FourCC {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Frame period (not rate): 30 fps is `1/30`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub numerator: u32,
    pub denominator: u32,
}

impl Interval {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// A discrete frame size and the intervals it supports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSize {
    pub width: u32,
    pub height: u32,
    pub intervals: Vec<Interval>,
}

/// A pixel format exposed by a video node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    #[serde(rename = "format")]
    pub pixel_format: FourCC,
    pub sizes: Vec<FormatSize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_matches_v4l2_layout() {
        // v4l2_fourcc('H', '2', '6', '4')
        assert_eq!(FourCC::H264.as_u32(), 0x3436_3248);
        assert_eq!(FourCC::MJPG.as_u32(), 0x4750_4a4d);
    }

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCC::H264.to_string(), "H264");
        assert_eq!(FourCC(FourCC::YUYV.0 | 1 << 31).to_string(), "YUYV-BE");
    }

    #[test]
    fn test_fourcc_parse() {
        assert_eq!("MJPG".parse::<FourCC>().unwrap(), FourCC::MJPG);
        assert!("MJPEG".parse::<FourCC>().is_err());
        let be: FourCC = "YUYV-BE".parse().unwrap();
        assert!(be.is_big_endian());
    }

    #[test]
    fn test_format_serializes_code_string() {
        let format = Format {
            pixel_format: FourCC::H264,
            sizes: vec![FormatSize {
                width: 1920,
                height: 1080,
                intervals: vec![Interval::new(1, 30)],
            }],
        };
        let json = serde_json::to_value(&format).unwrap();
        assert_eq!(json["format"], "H264");
        assert_eq!(json["sizes"][0]["intervals"][0]["denominator"], 30);
    }
}
