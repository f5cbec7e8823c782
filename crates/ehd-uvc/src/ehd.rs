//! exploreHD control facade
//!
//! The encoder options live behind the user extension unit's H.264
//! selector. Each option is one command on its own channel:
//!
//! | option  | command | width | byte order |
//! |---------|---------|-------|------------|
//! | bitrate | 0x02    | 4     | big        |
//! | gop     | 0x03    | 2     | little     |
//! | mode    | 0x06    | 1     | n/a        |

use ehd_core::{DeviceOptions, FourCC, H264Mode};
use tracing::{debug, info, warn};

use crate::device::CaptureDevice;
use crate::error::UvcError;
use crate::xu::{user_selector, ByteOrder, ControlChannel, Unit, WireValue, XuTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    Bitrate,
    Gop,
    Mode,
}

impl OptionKind {
    pub const ALL: [OptionKind; 3] = [OptionKind::Bitrate, OptionKind::Gop, OptionKind::Mode];

    pub fn command(self) -> u8 {
        match self {
            Self::Bitrate => 0x02,
            Self::Gop => 0x03,
            Self::Mode => 0x06,
        }
    }

    pub fn width(self) -> usize {
        match self {
            Self::Bitrate => 4,
            Self::Gop => 2,
            Self::Mode => 1,
        }
    }

    pub fn byte_order(self) -> ByteOrder {
        match self {
            Self::Bitrate => ByteOrder::BigEndian,
            Self::Gop | Self::Mode => ByteOrder::LittleEndian,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bitrate => "bitrate",
            Self::Gop => "gop",
            Self::Mode => "mode",
        }
    }

    fn channel(self) -> ControlChannel {
        ControlChannel::new(Unit::User, user_selector::H264_CTRL, self.command())
    }
}

/// Option channels plus the last values applied to or read from hardware
#[derive(Debug, Clone)]
pub struct H264Options {
    bitrate: ControlChannel,
    gop: ControlChannel,
    mode: ControlChannel,
    cached: DeviceOptions,
}

impl Default for H264Options {
    fn default() -> Self {
        Self::new(DeviceOptions::default())
    }
}

impl H264Options {
    pub fn new(cached: DeviceOptions) -> Self {
        Self {
            bitrate: OptionKind::Bitrate.channel(),
            gop: OptionKind::Gop.channel(),
            mode: OptionKind::Mode.channel(),
            cached,
        }
    }

    pub fn cached(&self) -> DeviceOptions {
        self.cached
    }

    fn channel_mut(&mut self, kind: OptionKind) -> &mut ControlChannel {
        match kind {
            OptionKind::Bitrate => &mut self.bitrate,
            OptionKind::Gop => &mut self.gop,
            OptionKind::Mode => &mut self.mode,
        }
    }

    fn write<T: WireValue>(
        &mut self,
        transport: &mut dyn XuTransport,
        kind: OptionKind,
        value: T,
    ) -> Result<(), UvcError> {
        debug_assert_eq!(T::SIZE, kind.width());
        let channel = self.channel_mut(kind);
        let result = channel
            .pack(value, kind.byte_order())
            .and_then(|()| channel.set(transport));
        channel.clear();
        result
    }

    fn read<T: WireValue>(
        &mut self,
        transport: &mut dyn XuTransport,
        kind: OptionKind,
    ) -> Result<T, UvcError> {
        debug_assert_eq!(T::SIZE, kind.width());
        let channel = self.channel_mut(kind);
        let result = channel
            .get(transport)
            .and_then(|()| channel.unpack(kind.byte_order()));
        channel.clear();
        result
    }

    pub fn set_bitrate(&mut self, transport: &mut dyn XuTransport, bitrate: u32) -> Result<(), UvcError> {
        self.write(transport, OptionKind::Bitrate, bitrate)?;
        self.cached.bitrate = bitrate;
        Ok(())
    }

    pub fn get_bitrate(&mut self, transport: &mut dyn XuTransport) -> Result<u32, UvcError> {
        let bitrate = self.read(transport, OptionKind::Bitrate)?;
        self.cached.bitrate = bitrate;
        Ok(bitrate)
    }

    pub fn set_gop(&mut self, transport: &mut dyn XuTransport, gop: u16) -> Result<(), UvcError> {
        self.write(transport, OptionKind::Gop, gop)?;
        self.cached.gop = gop;
        Ok(())
    }

    pub fn get_gop(&mut self, transport: &mut dyn XuTransport) -> Result<u16, UvcError> {
        let gop = self.read(transport, OptionKind::Gop)?;
        self.cached.gop = gop;
        Ok(gop)
    }

    pub fn set_mode(&mut self, transport: &mut dyn XuTransport, mode: H264Mode) -> Result<(), UvcError> {
        self.write(transport, OptionKind::Mode, mode.as_u8())?;
        self.cached.mode = mode;
        Ok(())
    }

    pub fn get_mode(&mut self, transport: &mut dyn XuTransport) -> Result<H264Mode, UvcError> {
        let raw: u8 = self.read(transport, OptionKind::Mode)?;
        let mode = H264Mode::from_u8(raw).ok_or(UvcError::InvalidOptionValue {
            option: OptionKind::Mode.name(),
            value: raw as u32,
        })?;
        self.cached.mode = mode;
        Ok(mode)
    }

    /// Read all three options from hardware into the cache
    pub fn refresh(&mut self, transport: &mut dyn XuTransport) -> Result<DeviceOptions, UvcError> {
        self.get_bitrate(transport)?;
        self.get_gop(transport)?;
        self.get_mode(transport)?;
        Ok(self.cached)
    }

    /// Write every option of `options` to hardware
    pub fn apply(&mut self, transport: &mut dyn XuTransport, options: DeviceOptions) -> Result<(), UvcError> {
        self.set_bitrate(transport, options.bitrate)?;
        self.set_gop(transport, options.gop)?;
        self.set_mode(transport, options.mode)
    }
}

/// An exploreHD: a capture device with encoder option channels bound to
/// the camera that exposes H.264
#[derive(Debug)]
pub struct ControlledCamera {
    device: CaptureDevice,
    h264_camera: usize,
    options: H264Options,
    nickname: String,
}

impl ControlledCamera {
    /// Bind to the H.264 camera and read the current options
    pub fn new(device: CaptureDevice) -> Result<Self, UvcError> {
        let mut camera = Self::from_parts(device, DeviceOptions::default())?;
        if let Err(e) = camera.refresh_options() {
            warn!(device = %camera.bus_info(), error = %e, "Failed to read encoder options");
        }
        info!(
            device = %camera.bus_info(),
            bitrate = camera.bitrate(),
            gop = camera.gop(),
            mode = %camera.mode(),
            "exploreHD ready"
        );
        Ok(camera)
    }

    /// Bind without touching hardware, seeding the cache with `options`
    pub fn from_parts(device: CaptureDevice, options: DeviceOptions) -> Result<Self, UvcError> {
        let h264_camera = device
            .find_camera_with_format(FourCC::H264)
            .ok_or(UvcError::NoH264Camera)?;
        Ok(Self {
            device,
            h264_camera,
            options: H264Options::new(options),
            nickname: String::new(),
        })
    }

    pub fn device(&self) -> &CaptureDevice {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut CaptureDevice {
        &mut self.device
    }

    pub fn bus_info(&self) -> &str {
        self.device.bus_info()
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }

    fn parts(&mut self) -> Result<(&mut H264Options, &mut dyn XuTransport), UvcError> {
        let camera: &mut dyn XuTransport = self
            .device
            .camera_mut(self.h264_camera)
            .ok_or(UvcError::NoH264Camera)?;
        Ok((&mut self.options, camera))
    }

    pub fn options(&self) -> DeviceOptions {
        self.options.cached()
    }

    pub fn bitrate(&self) -> u32 {
        self.options.cached().bitrate
    }

    pub fn gop(&self) -> u16 {
        self.options.cached().gop
    }

    pub fn mode(&self) -> H264Mode {
        self.options.cached().mode
    }

    pub fn set_bitrate(&mut self, bitrate: u32) -> Result<(), UvcError> {
        let (options, transport) = self.parts()?;
        options.set_bitrate(transport, bitrate)?;
        debug!(device = %self.bus_info(), bitrate, "Set bitrate");
        Ok(())
    }

    pub fn get_bitrate(&mut self) -> Result<u32, UvcError> {
        let (options, transport) = self.parts()?;
        options.get_bitrate(transport)
    }

    pub fn set_gop(&mut self, gop: u16) -> Result<(), UvcError> {
        let (options, transport) = self.parts()?;
        options.set_gop(transport, gop)?;
        debug!(device = %self.bus_info(), gop, "Set GOP");
        Ok(())
    }

    pub fn get_gop(&mut self) -> Result<u16, UvcError> {
        let (options, transport) = self.parts()?;
        options.get_gop(transport)
    }

    pub fn set_mode(&mut self, mode: H264Mode) -> Result<(), UvcError> {
        let (options, transport) = self.parts()?;
        options.set_mode(transport, mode)?;
        debug!(device = %self.bus_info(), mode = %mode, "Set H.264 mode");
        Ok(())
    }

    pub fn get_mode(&mut self) -> Result<H264Mode, UvcError> {
        let (options, transport) = self.parts()?;
        options.get_mode(transport)
    }

    pub fn refresh_options(&mut self) -> Result<DeviceOptions, UvcError> {
        let (options, transport) = self.parts()?;
        options.refresh(transport)
    }

    pub fn apply_options(&mut self, values: DeviceOptions) -> Result<(), UvcError> {
        let (options, transport) = self.parts()?;
        options.apply(transport, values)
    }
}
