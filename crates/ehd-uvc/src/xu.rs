//! Vendor extension-unit command channel
//!
//! Every command is a two-phase exchange on the same unit and selector:
//! first a select transfer carrying the `0x9A` tag and the command id,
//! then the payload transfer (SET_CUR to write, GET_CUR to read).
//!
//! ```text
//! select:  [0x9A][cmd][00 .. 00]   SET_CUR, BUFFER_SIZE bytes
//! payload: [value ...][00 .. 00]   SET_CUR or GET_CUR, BUFFER_SIZE bytes
//! ```

use std::io;
use std::mem::size_of;

use crate::error::UvcError;

pub const XU_TAG: u8 = 0x9A;
pub const BUFFER_SIZE: usize = 11;

/// Extension unit ids exposed by the exploreHD firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Unit {
    System = 0x02,
    User = 0x04,
}

/// Selectors of the user extension unit
pub mod user_selector {
    pub const FRAME_INFO: u8 = 0x01;
    pub const H264_CTRL: u8 = 0x02;
    pub const MJPG_CTRL: u8 = 0x03;
    pub const OSD_CTRL: u8 = 0x04;
    pub const MOTION_CTRL: u8 = 0x05;
    pub const IMG_SETTING: u8 = 0x06;
    pub const MULTI_STREAM_CTRL: u8 = 0x07;
    pub const GPIO_CTRL: u8 = 0x08;
    pub const DYNAMIC_FPS_CTRL: u8 = 0x09;
}

/// Selectors of the system extension unit
pub mod system_selector {
    pub const ASIC_RW: u8 = 0x01;
    pub const FLASH_CTRL: u8 = 0x03;
    pub const FRAME_INFO: u8 = 0x06;
    pub const H264_CTRL: u8 = 0x07;
    pub const MJPG_CTRL: u8 = 0x08;
    pub const OSD_CTRL: u8 = 0x09;
    pub const MOTION_DETECTION: u8 = 0x0A;
    pub const IMG_SETTING: u8 = 0x0B;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Raw SET_CUR/GET_CUR access to one camera's extension units
pub trait XuTransport {
    fn set_cur(&mut self, unit: Unit, selector: u8, data: &mut [u8]) -> io::Result<()>;
    fn get_cur(&mut self, unit: Unit, selector: u8, data: &mut [u8]) -> io::Result<()>;
}

/// Fixed-width integers that can be packed into a channel buffer
pub trait WireValue: Sized + Copy {
    const SIZE: usize;

    fn write_to(self, order: ByteOrder, out: &mut [u8]);
    fn read_from(order: ByteOrder, bytes: &[u8]) -> Self;
}

macro_rules! impl_wire_value {
    ($($ty:ty),*) => {
        $(
            impl WireValue for $ty {
                const SIZE: usize = size_of::<$ty>();

                fn write_to(self, order: ByteOrder, out: &mut [u8]) {
                    let bytes = match order {
                        ByteOrder::BigEndian => self.to_be_bytes(),
                        ByteOrder::LittleEndian => self.to_le_bytes(),
                    };
                    out[..Self::SIZE].copy_from_slice(&bytes);
                }

                fn read_from(order: ByteOrder, bytes: &[u8]) -> Self {
                    let mut raw = [0u8; size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    match order {
                        ByteOrder::BigEndian => <$ty>::from_be_bytes(raw),
                        ByteOrder::LittleEndian => <$ty>::from_le_bytes(raw),
                    }
                }
            }
        )*
    };
}

impl_wire_value!(u8, u16, u32);

/// One extension-unit command with its staging buffer
#[derive(Debug, Clone)]
pub struct ControlChannel {
    unit: Unit,
    selector: u8,
    command: u8,
    data: [u8; BUFFER_SIZE],
    cursor: usize,
}

impl ControlChannel {
    pub fn new(unit: Unit, selector: u8, command: u8) -> Self {
        Self {
            unit,
            selector,
            command,
            data: [0; BUFFER_SIZE],
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn data(&self) -> &[u8; BUFFER_SIZE] {
        &self.data
    }

    fn check_bounds(&self, len: usize) -> Result<(), UvcError> {
        if self.cursor + len > BUFFER_SIZE {
            return Err(UvcError::ChannelOverflow {
                cursor: self.cursor,
                len,
                size: BUFFER_SIZE,
            });
        }
        Ok(())
    }

    /// Write `value` at the cursor and advance past it
    pub fn pack<T: WireValue>(&mut self, value: T, order: ByteOrder) -> Result<(), UvcError> {
        self.check_bounds(T::SIZE)?;
        value.write_to(order, &mut self.data[self.cursor..]);
        self.cursor += T::SIZE;
        Ok(())
    }

    /// Read a value at the cursor and advance past it
    pub fn unpack<T: WireValue>(&mut self, order: ByteOrder) -> Result<T, UvcError> {
        self.check_bounds(T::SIZE)?;
        let value = T::read_from(order, &self.data[self.cursor..]);
        self.cursor += T::SIZE;
        Ok(value)
    }

    fn select(&self, transport: &mut dyn XuTransport) -> Result<(), UvcError> {
        let mut header = [0u8; BUFFER_SIZE];
        header[0] = XU_TAG;
        header[1] = self.command;
        transport
            .set_cur(self.unit, self.selector, &mut header)
            .map_err(|source| UvcError::ControlChannelFailure {
                command: self.command,
                phase: "select",
                source,
            })
    }

    /// Send the packed payload; the staging buffer is zeroed afterwards
    pub fn set(&mut self, transport: &mut dyn XuTransport) -> Result<(), UvcError> {
        self.cursor = 0;
        self.select(transport)?;

        let mut payload = self.data;
        let result = transport
            .set_cur(self.unit, self.selector, &mut payload)
            .map_err(|source| UvcError::ControlChannelFailure {
                command: self.command,
                phase: "set",
                source,
            });
        self.data = [0; BUFFER_SIZE];
        result
    }

    /// Read the current value into the staging buffer
    pub fn get(&mut self, transport: &mut dyn XuTransport) -> Result<(), UvcError> {
        self.data = [0; BUFFER_SIZE];
        self.cursor = 0;
        self.select(transport)?;

        transport
            .get_cur(self.unit, self.selector, &mut self.data)
            .map_err(|source| UvcError::ControlChannelFailure {
                command: self.command,
                phase: "get",
                source,
            })
    }

    pub fn clear(&mut self) {
        self.data = [0; BUFFER_SIZE];
        self.cursor = 0;
    }
}
