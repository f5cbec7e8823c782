//! A single opened video node

use ehd_core::{FourCC, Format, FormatSize, Interval};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use tracing::{debug, trace};

use crate::error::UvcError;
use crate::sys::{self, c_str};
use crate::xu::{Unit, XuTransport};

/// Card name and bus info reported by `VIDIOC_QUERYCAP`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub card: String,
    pub bus_info: String,
}

/// Query a node's capability without keeping it open
pub fn query_capability(path: &Path) -> io::Result<Capability> {
    let file = File::open(path)?;
    let mut cap = sys::V4l2Capability::default();
    // SAFETY: cap is the structure VIDIOC_QUERYCAP was sized for
    unsafe { sys::xioctl(file.as_raw_fd(), sys::VIDIOC_QUERYCAP, &mut cap)? };
    Ok(Capability {
        card: c_str(&cap.card),
        bus_info: c_str(&cap.bus_info),
    })
}

/// One kernel video node and the formats it exposes
///
/// The file descriptor is owned and closed on drop.
#[derive(Debug)]
pub struct Camera {
    path: String,
    file: Option<File>,
    formats: Vec<Format>,
}

impl Camera {
    /// Open a node and enumerate its discrete formats
    pub fn open(path: &str) -> Result<Self, UvcError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| UvcError::OpenFailure {
                path: path.to_string(),
                source,
            })?;

        let formats = enumerate_formats(file.as_raw_fd())?;
        if formats.is_empty() {
            return Err(UvcError::Incompatible(path.to_string()));
        }
        debug!(path = %path, formats = formats.len(), "Opened camera");

        Ok(Self {
            path: path.to_string(),
            file: Some(file),
            formats,
        })
    }

    /// A camera with known formats but no open node; every ioctl fails
    pub fn detached(path: impl Into<String>, formats: Vec<Format>) -> Self {
        Self {
            path: path.into(),
            file: None,
            formats,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn supports(&self, pixel_format: FourCC) -> bool {
        self.formats.iter().any(|f| f.pixel_format == pixel_format)
    }

    pub(crate) fn fd(&self) -> io::Result<RawFd> {
        self.file
            .as_ref()
            .map(|f| f.as_raw_fd())
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }

    fn uvc_query(&self, unit: Unit, selector: u8, query: u8, data: &mut [u8]) -> io::Result<()> {
        let fd = self.fd()?;
        let mut request = sys::UvcXuControlQuery {
            unit: unit as u8,
            selector,
            query,
            size: data.len() as u16,
            data: data.as_mut_ptr(),
        };
        trace!(path = %self.path, unit = unit as u8, selector, query, "UVC control query");
        // SAFETY: request.data points at `data`, which outlives the call and
        // holds exactly `size` bytes
        unsafe { sys::xioctl(fd, sys::UVCIOC_CTRL_QUERY, &mut request) }
    }
}

impl XuTransport for Camera {
    fn set_cur(&mut self, unit: Unit, selector: u8, data: &mut [u8]) -> io::Result<()> {
        self.uvc_query(unit, selector, sys::UVC_SET_CUR, data)
    }

    fn get_cur(&mut self, unit: Unit, selector: u8, data: &mut [u8]) -> io::Result<()> {
        self.uvc_query(unit, selector, sys::UVC_GET_CUR, data)
    }
}

fn enumerate_formats(fd: RawFd) -> io::Result<Vec<Format>> {
    let mut formats = Vec::new();
    let mut desc = sys::V4l2FmtDesc {
        type_: sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
        ..Default::default()
    };

    // SAFETY: desc is the structure VIDIOC_ENUM_FMT was sized for
    while unsafe { sys::xioctl_valid(fd, sys::VIDIOC_ENUM_FMT, &mut desc)? } {
        let pixel_format = FourCC::from(desc.pixelformat);
        formats.push(Format {
            pixel_format,
            sizes: enumerate_sizes(fd, pixel_format)?,
        });
        desc.index += 1;
    }

    Ok(formats)
}

fn enumerate_sizes(fd: RawFd, pixel_format: FourCC) -> io::Result<Vec<FormatSize>> {
    let mut sizes = Vec::new();
    let mut size = sys::V4l2FrmSizeEnum {
        pixel_format: pixel_format.as_u32(),
        ..Default::default()
    };

    // SAFETY: size is the structure VIDIOC_ENUM_FRAMESIZES was sized for
    while unsafe { sys::xioctl_valid(fd, sys::VIDIOC_ENUM_FRAMESIZES, &mut size)? } {
        // Stepwise and continuous ranges report a single entry
        if size.type_ != sys::V4L2_FRMSIZE_TYPE_DISCRETE {
            break;
        }
        let (width, height) = (size.union[0], size.union[1]);
        sizes.push(FormatSize {
            width,
            height,
            intervals: enumerate_intervals(fd, pixel_format, width, height)?,
        });
        size.index += 1;
    }

    Ok(sizes)
}

fn enumerate_intervals(
    fd: RawFd,
    pixel_format: FourCC,
    width: u32,
    height: u32,
) -> io::Result<Vec<Interval>> {
    let mut intervals = Vec::new();
    let mut ival = sys::V4l2FrmIvalEnum {
        pixel_format: pixel_format.as_u32(),
        width,
        height,
        ..Default::default()
    };

    // SAFETY: ival is the structure VIDIOC_ENUM_FRAMEINTERVALS was sized for
    while unsafe { sys::xioctl_valid(fd, sys::VIDIOC_ENUM_FRAMEINTERVALS, &mut ival)? } {
        if ival.type_ != sys::V4L2_FRMIVAL_TYPE_DISCRETE {
            break;
        }
        intervals.push(Interval::new(ival.union[0], ival.union[1]));
        ival.index += 1;
    }

    Ok(intervals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h264_format() -> Format {
        Format {
            pixel_format: FourCC::H264,
            sizes: vec![FormatSize {
                width: 1920,
                height: 1080,
                intervals: vec![Interval::new(1, 30)],
            }],
        }
    }

    #[test]
    fn test_open_missing_node() {
        match Camera::open("/dev/video-does-not-exist") {
            Err(UvcError::OpenFailure { path, .. }) => {
                assert_eq!(path, "/dev/video-does-not-exist")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_detached_camera_formats() {
        let camera = Camera::detached("/dev/video2", vec![h264_format()]);
        assert!(camera.supports(FourCC::H264));
        assert!(!camera.supports(FourCC::MJPG));
        assert_eq!(camera.path(), "/dev/video2");
    }

    #[test]
    fn test_detached_camera_rejects_transfers() {
        let mut camera = Camera::detached("/dev/video2", vec![h264_format()]);
        let mut data = [0u8; 11];
        let err = camera.set_cur(Unit::User, 0x02, &mut data).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}
