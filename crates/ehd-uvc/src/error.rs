use ehd_core::FourCC;
use ehd_stream::StreamError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UvcError {
    #[error("Failed to open {path}: {source}")]
    OpenFailure {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} exposes no usable pixel formats")]
    Incompatible(String),
    #[error("Failed to enumerate video devices: {0}")]
    EnumerationError(String),
    #[error("Device attribute not found: {0}")]
    AttributeNotFound(String),
    #[error("Extension unit command 0x{command:02x} failed during {phase}: {source}")]
    ControlChannelFailure {
        command: u8,
        phase: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("Channel buffer overflow: {len} bytes at offset {cursor} exceeds {size}")]
    ChannelOverflow { cursor: usize, len: usize, size: usize },
    #[error("Invalid {option} value from device: {value}")]
    InvalidOptionValue { option: &'static str, value: u32 },
    #[error("Device has no camera exposing H.264")]
    NoH264Camera,
    #[error("No camera supports pixel format {0}")]
    FormatNotSupported(FourCC),
    #[error("Pixel format {0} cannot be streamed")]
    UnsupportedPixelFormat(FourCC),
    #[error("Control 0x{id:08x} failed: {source}")]
    ControlFailure {
        id: u32,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
