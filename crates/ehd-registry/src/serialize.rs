use ehd_core::schema::{SerializedCamera, SerializedControl, SerializedInfo, SerializedOptions};
use ehd_core::{SerializedDevice, StreamState};
use ehd_uvc::ControlledCamera;
use tracing::debug;

/// Build the external view of a device
///
/// Controls are re-queried and read live; a control whose value cannot be
/// read serializes with a null value.
pub fn serialize_device(camera: &mut ControlledCamera) -> SerializedDevice {
    let nickname = camera.nickname().to_string();
    let options = SerializedOptions::from(camera.options());
    let device = camera.device_mut();

    if let Err(e) = device.query_controls() {
        debug!(device = %device.bus_info(), error = %e, "Using cached control list");
    }

    let info = SerializedInfo {
        path: device.sysfs_path().display().to_string(),
        name: device.info().device_name.clone(),
        vendor_id: device.vendor_id().unwrap_or_default(),
        product_id: device.product_id().unwrap_or_default(),
        usb_info: device.bus_info().to_string(),
        nickname,
    };

    let cameras = device
        .cameras()
        .iter()
        .map(|c| SerializedCamera {
            device_path: c.path().to_string(),
            formats: c.formats().to_vec(),
        })
        .collect();

    let controls = device
        .controls()
        .iter()
        .map(|control| SerializedControl::new(control, device.get_control(control.id).ok()))
        .collect();

    let pipeline = device.pipeline();
    let stream = StreamState::from_pipeline(pipeline.is_configured(), pipeline.info());

    SerializedDevice {
        info,
        options,
        cameras,
        controls,
        stream,
    }
}
