//! UVC control descriptors

use serde::{Deserialize, Serialize};

/// Control value type, mirroring `enum v4l2_ctrl_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    Integer,
    Boolean,
    Menu,
    Button,
    Integer64,
    CtrlClass,
    String,
    Bitmask,
    IntegerMenu,
    Other(u32),
}

impl ControlType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Integer,
            2 => Self::Boolean,
            3 => Self::Menu,
            4 => Self::Button,
            5 => Self::Integer64,
            6 => Self::CtrlClass,
            7 => Self::String,
            8 => Self::Bitmask,
            9 => Self::IntegerMenu,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Self::Integer => 1,
            Self::Boolean => 2,
            Self::Menu => 3,
            Self::Button => 4,
            Self::Integer64 => 5,
            Self::CtrlClass => 6,
            Self::String => 7,
            Self::Bitmask => 8,
            Self::IntegerMenu => 9,
            Self::Other(raw) => raw,
        }
    }

    /// Whether this control carries a nested menu enumeration
    pub fn has_menu(self) -> bool {
        matches!(self, Self::Menu | Self::IntegerMenu)
    }
}

// The external schema carries the raw kernel type tag.
impl Serialize for ControlType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.as_raw())
    }
}

impl<'de> Deserialize<'de> for ControlType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_raw(u32::deserialize(deserializer)?))
    }
}

/// Control flag bits from `VIDIOC_QUERYCTRL`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlags {
    pub disabled: bool,
    pub grabbed: bool,
    pub read_only: bool,
    pub update: bool,
    pub slider: bool,
    pub write_only: bool,
    pub volatile: bool,
}

impl ControlFlags {
    const DISABLED: u32 = 0x0001;
    const GRABBED: u32 = 0x0002;
    const READ_ONLY: u32 = 0x0004;
    const UPDATE: u32 = 0x0008;
    const SLIDER: u32 = 0x0020;
    const WRITE_ONLY: u32 = 0x0040;
    const VOLATILE: u32 = 0x0080;

    pub fn from_bits(bits: u32) -> Self {
        Self {
            disabled: bits & Self::DISABLED != 0,
            grabbed: bits & Self::GRABBED != 0,
            read_only: bits & Self::READ_ONLY != 0,
            update: bits & Self::UPDATE != 0,
            slider: bits & Self::SLIDER != 0,
            write_only: bits & Self::WRITE_ONLY != 0,
            volatile: bits & Self::VOLATILE != 0,
        }
    }
}

/// One entry of a menu-typed control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MenuItem {
    /// Ordinary menu: a named entry
    Named { index: u32, name: String },
    /// Integer menu: a numeric entry
    Integer { index: u32, value: i64 },
}

/// A UVC/V4L2 control descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub id: u32,
    pub name: String,
    pub flags: ControlFlags,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub default_value: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu: Vec<MenuItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_bits() {
        let flags = ControlFlags::from_bits(0x0004 | 0x0020);
        assert!(flags.read_only);
        assert!(flags.slider);
        assert!(!flags.disabled);
        assert!(!flags.volatile);
    }

    #[test]
    fn test_control_type_round_trip() {
        assert_eq!(ControlType::from_raw(9), ControlType::IntegerMenu);
        assert!(ControlType::from_raw(3).has_menu());
        assert!(!ControlType::Integer.has_menu());
        assert_eq!(ControlType::from_raw(0x100).as_raw(), 0x100);
    }
}
