//! Raw V4L2 and uvcvideo ioctl bindings

use std::io;
use std::mem::size_of;
use std::os::unix::io::RawFd;

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    (dir << 30) | ((size as u32) << 16) | ((ty as u32) << 8) | nr as u32
}

const fn ior<T>(ty: u8, nr: u8) -> u32 {
    ioc(IOC_READ, ty, nr, size_of::<T>())
}

const fn iowr<T>(ty: u8, nr: u8) -> u32 {
    ioc(IOC_READ | IOC_WRITE, ty, nr, size_of::<T>())
}

pub const VIDIOC_QUERYCAP: u32 = ior::<V4l2Capability>(b'V', 0);
pub const VIDIOC_ENUM_FMT: u32 = iowr::<V4l2FmtDesc>(b'V', 2);
pub const VIDIOC_G_CTRL: u32 = iowr::<V4l2Control>(b'V', 27);
pub const VIDIOC_S_CTRL: u32 = iowr::<V4l2Control>(b'V', 28);
pub const VIDIOC_QUERYCTRL: u32 = iowr::<V4l2QueryCtrl>(b'V', 36);
pub const VIDIOC_QUERYMENU: u32 = iowr::<V4l2QueryMenu>(b'V', 37);
pub const VIDIOC_ENUM_FRAMESIZES: u32 = iowr::<V4l2FrmSizeEnum>(b'V', 74);
pub const VIDIOC_ENUM_FRAMEINTERVALS: u32 = iowr::<V4l2FrmIvalEnum>(b'V', 75);
pub const UVCIOC_CTRL_QUERY: u32 = iowr::<UvcXuControlQuery>(b'u', 0x21);

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const V4L2_FRMSIZE_TYPE_DISCRETE: u32 = 1;
pub const V4L2_FRMIVAL_TYPE_DISCRETE: u32 = 1;

pub const V4L2_CID_BASE: u32 = 0x0098_0900;
pub const V4L2_CID_LASTP1: u32 = V4L2_CID_BASE + 44;

pub const UVC_SET_CUR: u8 = 0x01;
pub const UVC_GET_CUR: u8 = 0x81;

#[repr(C)]
#[derive(Default)]
pub struct V4l2Capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Default)]
pub struct V4l2FmtDesc {
    pub index: u32,
    pub type_: u32,
    pub flags: u32,
    pub description: [u8; 32],
    pub pixelformat: u32,
    pub mbus_code: u32,
    pub reserved: [u32; 3],
}

/// `v4l2_frmsizeenum`; the union holds `{width, height}` when discrete
#[repr(C)]
#[derive(Default)]
pub struct V4l2FrmSizeEnum {
    pub index: u32,
    pub pixel_format: u32,
    pub type_: u32,
    pub union: [u32; 6],
    pub reserved: [u32; 2],
}

/// `v4l2_frmivalenum`; the union holds `{numerator, denominator}` when discrete
#[repr(C)]
#[derive(Default)]
pub struct V4l2FrmIvalEnum {
    pub index: u32,
    pub pixel_format: u32,
    pub width: u32,
    pub height: u32,
    pub type_: u32,
    pub union: [u32; 6],
    pub reserved: [u32; 2],
}

#[repr(C)]
#[derive(Default)]
pub struct V4l2QueryCtrl {
    pub id: u32,
    pub type_: u32,
    pub name: [u8; 32],
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
    pub reserved: [u32; 2],
}

/// `v4l2_querymenu`; the 32-byte union is either a name or an `i64` value
#[repr(C)]
#[derive(Default)]
pub struct V4l2QueryMenu {
    pub id: u32,
    pub index: u32,
    pub union: [u8; 32],
    pub reserved: u32,
}

impl V4l2QueryMenu {
    pub fn value(&self) -> i64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.union[..8]);
        i64::from_ne_bytes(bytes)
    }
}

#[repr(C)]
#[derive(Default)]
pub struct V4l2Control {
    pub id: u32,
    pub value: i32,
}

#[repr(C)]
pub struct UvcXuControlQuery {
    pub unit: u8,
    pub selector: u8,
    pub query: u8,
    pub size: u16,
    pub data: *mut u8,
}

/// Issue an ioctl, retrying on EINTR
///
/// # Safety
/// `arg` must be the structure type the request number was built for.
pub unsafe fn xioctl<T>(fd: RawFd, request: u32, arg: &mut T) -> io::Result<()> {
    loop {
        // SAFETY: upheld by the caller
        let result = unsafe { libc::ioctl(fd, request as _, arg as *mut T) };
        if result != -1 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

/// Like `xioctl`, but EINVAL (end of an enumeration) yields `Ok(false)`
///
/// # Safety
/// Same as `xioctl`.
pub unsafe fn xioctl_valid<T>(fd: RawFd, request: u32, arg: &mut T) -> io::Result<bool> {
    match unsafe { xioctl(fd, request, arg) } {
        Ok(()) => Ok(true),
        Err(e) if e.raw_os_error() == Some(libc::EINVAL) => Ok(false),
        Err(e) => Err(e),
    }
}

/// NUL-terminated kernel string to `String`
pub fn c_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
