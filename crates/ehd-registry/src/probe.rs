//! Hardware access seam for the registry

use ehd_core::DeviceInfo;
use ehd_stream::PipelineLauncher;
use ehd_uvc::{list_devices, CaptureDevice, ControlledCamera, UvcError, EHD_PRODUCT_ID, EHD_VENDOR_ID};
use std::sync::Arc;
use tracing::debug;

/// Lists and opens devices; calls block and run on the blocking pool
pub trait DeviceProbe: Send + Sync {
    fn list(&self) -> Result<Vec<DeviceInfo>, UvcError>;

    /// Open a listed device; `Ok(None)` when it is not an exploreHD
    fn open(&self, info: &DeviceInfo) -> Result<Option<ControlledCamera>, UvcError>;
}

/// Probe backed by V4L2 and sysfs
pub struct V4l2Probe {
    vendor_id: String,
    product_id: String,
    launcher: Arc<dyn PipelineLauncher>,
}

impl V4l2Probe {
    pub fn new(launcher: Arc<dyn PipelineLauncher>) -> Self {
        Self {
            vendor_id: EHD_VENDOR_ID.to_string(),
            product_id: EHD_PRODUCT_ID.to_string(),
            launcher,
        }
    }

    /// Match a different USB vendor/product pair
    pub fn with_ids(mut self, vendor_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        self.vendor_id = vendor_id.into();
        self.product_id = product_id.into();
        self
    }
}

impl DeviceProbe for V4l2Probe {
    fn list(&self) -> Result<Vec<DeviceInfo>, UvcError> {
        list_devices()
    }

    fn open(&self, info: &DeviceInfo) -> Result<Option<ControlledCamera>, UvcError> {
        let mut device = CaptureDevice::open(info.clone(), self.launcher.clone())?;

        let vendor = device.vendor_id()?;
        let product = device.product_id()?;
        if !ids_match(&vendor, &product, &self.vendor_id, &self.product_id) {
            debug!(device = %info.bus_info, %vendor, %product, "Not an exploreHD");
            return Ok(None);
        }
        ControlledCamera::new(device).map(Some)
    }
}

/// USB ids from sysfs are lowercase hex; compare without case
fn ids_match(vendor: &str, product: &str, expected_vendor: &str, expected_product: &str) -> bool {
    vendor.eq_ignore_ascii_case(expected_vendor) && product.eq_ignore_ascii_case(expected_product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehd_core::DeviceInfo;
    use ehd_stream::GstLaunch;

    #[test]
    fn test_ids_match() {
        assert!(ids_match("0c45", "6366", EHD_VENDOR_ID, EHD_PRODUCT_ID));
        assert!(ids_match("0C45", "6366", "0c45", "6366"));
        assert!(!ids_match("046d", "6366", "0c45", "6366"));
        assert!(!ids_match("0c45", "0825", "0c45", "6366"));
    }

    #[test]
    fn test_open_missing_node_is_error() {
        let probe = V4l2Probe::new(Arc::new(GstLaunch::default()));
        let mut info = DeviceInfo::new("exploreHD", "usb-missing");
        info.video_node_paths = vec!["/dev/ehd-test-missing-video0".to_string()];
        assert!(probe.open(&info).is_err());
    }
}
