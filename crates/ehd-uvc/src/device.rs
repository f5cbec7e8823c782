//! A physical capture device: its cameras, controls, sysfs attributes and
//! stream pipeline

use ehd_core::{
    Control, ControlFlags, ControlType, DeviceInfo, EncodeType, FourCC, Interval, MenuItem,
    StreamEndpoint, StreamInformation, StreamType,
};
use ehd_stream::{PipelineLauncher, StreamPipeline};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::camera::Camera;
use crate::enumerate::SYSFS_VIDEO4LINUX;
use crate::error::UvcError;
use crate::sys::{self, c_str};

/// Resolve the USB device directory that owns a video node
///
/// `<class_root>/videoN` links to `.../<usb-dev>/<interface>/video4linux/videoN`,
/// so the device directory is three levels above the resolved node.
pub fn resolve_sysfs_path(class_root: &Path, node_path: &str) -> io::Result<PathBuf> {
    let node = Path::new(node_path)
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "node path has no file name"))?;
    let resolved = std::fs::canonicalize(class_root.join(node))?;
    resolved
        .ancestors()
        .nth(3)
        .map(Path::to_path_buf)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "sysfs path too shallow"))
}

pub struct CaptureDevice {
    info: DeviceInfo,
    cameras: Vec<Camera>,
    pipeline: StreamPipeline,
    controls: Vec<Control>,
    sysfs_path: PathBuf,
    attributes: HashMap<String, String>,
}

impl std::fmt::Debug for CaptureDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureDevice")
            .field("bus_info", &self.info.bus_info)
            .field("cameras", &self.cameras)
            .field("sysfs_path", &self.sysfs_path)
            .finish()
    }
}

impl CaptureDevice {
    /// Open every node of an enumerated device
    ///
    /// Nodes that fail to open or expose no formats are skipped; a device
    /// with no usable node at all is `Incompatible`.
    pub fn open(info: DeviceInfo, launcher: Arc<dyn PipelineLauncher>) -> Result<Self, UvcError> {
        let mut cameras = Vec::new();
        for path in &info.video_node_paths {
            match Camera::open(path) {
                Ok(camera) => cameras.push(camera),
                Err(e) => debug!(device = %info.bus_info, path = %path, error = %e, "Skipping node"),
            }
        }
        if cameras.is_empty() {
            return Err(UvcError::Incompatible(info.bus_info.clone()));
        }

        let first = &info.video_node_paths[0];
        let sysfs_path = resolve_sysfs_path(Path::new(SYSFS_VIDEO4LINUX), first)?;

        Ok(Self::from_parts(info, cameras, sysfs_path, StreamPipeline::new(launcher)))
    }

    /// Assemble a device from already opened cameras
    pub fn from_parts(
        info: DeviceInfo,
        cameras: Vec<Camera>,
        sysfs_path: PathBuf,
        pipeline: StreamPipeline,
    ) -> Self {
        Self {
            info,
            cameras,
            pipeline,
            controls: Vec::new(),
            sysfs_path,
            attributes: HashMap::new(),
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn bus_info(&self) -> &str {
        &self.info.bus_info
    }

    pub fn sysfs_path(&self) -> &Path {
        &self.sysfs_path
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub(crate) fn camera_mut(&mut self, index: usize) -> Option<&mut Camera> {
        self.cameras.get_mut(index)
    }

    pub fn pipeline(&self) -> &StreamPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut StreamPipeline {
        &mut self.pipeline
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// Whether `path` is this device's sysfs directory or one of its nodes
    pub fn matches_path(&self, path: &str) -> bool {
        self.sysfs_path.as_os_str() == path || self.cameras.iter().any(|c| c.path() == path)
    }

    /// Read a sysfs attribute of the USB device, memoized after first read
    pub fn attribute(&mut self, name: &str) -> Result<String, UvcError> {
        if let Some(value) = self.attributes.get(name) {
            return Ok(value.clone());
        }
        let value = std::fs::read_to_string(self.sysfs_path.join(name))
            .map_err(|_| UvcError::AttributeNotFound(name.to_string()))?
            .trim()
            .to_string();
        self.attributes.insert(name.to_string(), value.clone());
        Ok(value)
    }

    pub fn vendor_id(&mut self) -> Result<String, UvcError> {
        self.attribute("idVendor")
    }

    pub fn product_id(&mut self) -> Result<String, UvcError> {
        self.attribute("idProduct")
    }

    /// Index of the first camera exposing `pixel_format`
    pub fn find_camera_with_format(&self, pixel_format: FourCC) -> Option<usize> {
        self.cameras.iter().position(|c| c.supports(pixel_format))
    }

    fn control_fd(&self) -> Result<i32, UvcError> {
        let camera = self
            .cameras
            .first()
            .ok_or_else(|| UvcError::Incompatible(self.info.bus_info.clone()))?;
        Ok(camera.fd()?)
    }

    /// Re-query the standard user controls from the first camera
    pub fn query_controls(&mut self) -> Result<&[Control], UvcError> {
        let fd = self.control_fd()?;
        let mut controls = Vec::new();

        for id in sys::V4L2_CID_BASE..sys::V4L2_CID_LASTP1 {
            let mut query = sys::V4l2QueryCtrl {
                id,
                ..Default::default()
            };
            // SAFETY: query is the structure VIDIOC_QUERYCTRL was sized for
            if unsafe { sys::xioctl(fd, sys::VIDIOC_QUERYCTRL, &mut query) }.is_err() {
                continue;
            }

            let control_type = ControlType::from_raw(query.type_);
            let menu = if control_type.has_menu() {
                query_menu(fd, id, control_type, query.minimum, query.maximum)
            } else {
                Vec::new()
            };

            controls.push(Control {
                id,
                name: c_str(&query.name),
                flags: ControlFlags::from_bits(query.flags),
                control_type,
                min: query.minimum,
                max: query.maximum,
                step: query.step,
                default_value: query.default_value,
                menu,
            });
        }

        debug!(device = %self.info.bus_info, count = controls.len(), "Queried controls");
        self.controls = controls;
        Ok(&self.controls)
    }

    pub fn get_control(&self, id: u32) -> Result<i32, UvcError> {
        let fd = self.control_fd()?;
        let mut control = sys::V4l2Control { id, value: 0 };
        // SAFETY: control is the structure VIDIOC_G_CTRL was sized for
        unsafe { sys::xioctl(fd, sys::VIDIOC_G_CTRL, &mut control) }
            .map_err(|source| UvcError::ControlFailure { id, source })?;
        Ok(control.value)
    }

    pub fn set_control(&mut self, id: u32, value: i32) -> Result<(), UvcError> {
        let fd = self.control_fd()?;
        let mut control = sys::V4l2Control { id, value };
        // SAFETY: control is the structure VIDIOC_S_CTRL was sized for
        unsafe { sys::xioctl(fd, sys::VIDIOC_S_CTRL, &mut control) }
            .map_err(|source| UvcError::ControlFailure { id, source })?;
        debug!(device = %self.info.bus_info, id, value, "Set control");
        Ok(())
    }

    /// Point the pipeline at the camera that provides `pixel_format`
    ///
    /// Nothing changes unless the whole configuration is valid.
    pub fn configure_stream(
        &mut self,
        pixel_format: FourCC,
        width: u32,
        height: u32,
        interval: Interval,
        stream_type: StreamType,
        endpoints: Vec<StreamEndpoint>,
    ) -> Result<(), UvcError> {
        let index = self
            .find_camera_with_format(pixel_format)
            .ok_or(UvcError::FormatNotSupported(pixel_format))?;
        let encode_type = EncodeType::from_pixel_format(pixel_format)
            .ok_or(UvcError::UnsupportedPixelFormat(pixel_format))?;

        self.pipeline.configure(StreamInformation {
            device_path: self.cameras[index].path().to_string(),
            encode_type,
            stream_type,
            width,
            height,
            interval,
            endpoints,
        });
        Ok(())
    }

    pub fn start_stream(&mut self) -> Result<(), UvcError> {
        Ok(self.pipeline.start()?)
    }

    pub fn stop_stream(&mut self) {
        self.pipeline.stop();
    }

    /// Stop the stream and drop its configuration
    pub fn unconfigure_stream(&mut self) {
        self.pipeline.unconfigure();
    }

    pub fn add_stream_endpoint(&mut self, endpoint: StreamEndpoint) {
        self.pipeline.add_endpoint(endpoint);
    }

    pub fn remove_stream_endpoint(&mut self, index: usize) -> Result<StreamEndpoint, UvcError> {
        Ok(self.pipeline.remove_endpoint(index)?)
    }
}

/// Upper bound on menu entries queried per control
const MAX_MENU_ENTRIES: u32 = 256;

/// Indices to query for a menu spanning `min..=max`, capped at
/// `MAX_MENU_ENTRIES`
fn menu_indices(min: i32, max: i32) -> std::ops::RangeInclusive<u32> {
    let start = min.max(0) as u32;
    let end = (max.max(0) as u32).min(start.saturating_add(MAX_MENU_ENTRIES - 1));
    start..=end
}

fn query_menu(fd: i32, id: u32, control_type: ControlType, min: i32, max: i32) -> Vec<MenuItem> {
    let mut items = Vec::new();
    for index in menu_indices(min, max) {
        let mut menu = sys::V4l2QueryMenu {
            id,
            index,
            ..Default::default()
        };
        // SAFETY: menu is the structure VIDIOC_QUERYMENU was sized for
        if let Err(e) = unsafe { sys::xioctl(fd, sys::VIDIOC_QUERYMENU, &mut menu) } {
            // Menus may have holes; anything else ends the walk
            if e.raw_os_error() == Some(libc::EINVAL) {
                continue;
            }
            warn!(id, index, error = %e, "Menu query failed");
            break;
        }
        items.push(match control_type {
            ControlType::IntegerMenu => MenuItem::Integer {
                index,
                value: menu.value(),
            },
            _ => MenuItem::Named {
                index,
                name: c_str(&menu.union),
            },
        });
    }
    items
}
