//! Applying and capturing persisted device settings

use ehd_core::settings::{SavedControl, SavedControls, SavedOptions, SavedStream};
use ehd_core::SavedDevice;
use ehd_uvc::ControlledCamera;
use tracing::{debug, info, warn};

use crate::error::RegistryError;

/// Apply a saved record to a freshly opened device
///
/// Hardware failures are logged per item and do not stop the rest of the
/// record from being applied. A saved stream is configured and started.
pub fn restore(camera: &mut ControlledCamera, record: &SavedDevice) {
    let bus_info = camera.bus_info().to_string();
    camera.set_nickname(record.nickname.clone());

    match record.options.to_options() {
        Ok(options) => {
            if let Err(e) = camera.apply_options(options) {
                warn!(device = %bus_info, error = %e, "Failed to restore encoder options");
            }
        }
        Err(e) => warn!(device = %bus_info, error = %e, "Invalid saved options"),
    }

    for control in &record.controls.control {
        if let Err(e) = camera.device_mut().set_control(control.id, control.value) {
            debug!(device = %bus_info, id = control.id, error = %e, "Failed to restore control");
        }
    }

    if let Some(stream) = &record.stream {
        if let Err(e) = restore_stream(camera, stream) {
            warn!(device = %bus_info, error = %e, "Failed to restore stream");
        }
    }

    info!(device = %bus_info, nickname = %record.nickname, "Restored device settings");
}

fn restore_stream(camera: &mut ControlledCamera, stream: &SavedStream) -> Result<(), RegistryError> {
    let encode_type = stream.encode_type()?;
    let stream_type = stream.stream_type()?;
    let Some(pixel_format) = encode_type.pixel_format() else {
        return Ok(());
    };

    let device = camera.device_mut();
    device.configure_stream(
        pixel_format,
        stream.width,
        stream.height,
        stream.interval(),
        stream_type,
        stream.endpoints(),
    )?;
    device.start_stream()?;
    Ok(())
}

/// Capture a device's current settings as a record
pub fn snapshot(camera: &mut ControlledCamera) -> SavedDevice {
    let options = SavedOptions::from(camera.options());
    let nickname = camera.nickname().to_string();
    let device = camera.device_mut();

    if device.controls().is_empty() {
        if let Err(e) = device.query_controls() {
            debug!(device = %device.bus_info(), error = %e, "No controls to save");
        }
    }

    let controls = device
        .controls()
        .iter()
        .filter(|c| !c.flags.read_only && !c.flags.disabled)
        .filter_map(|c| {
            device
                .get_control(c.id)
                .ok()
                .map(|value| SavedControl { id: c.id, value })
        })
        .collect();

    let pipeline = device.pipeline();
    let stream = pipeline
        .is_configured()
        .then(|| SavedStream::from(pipeline.info()));

    SavedDevice {
        usb_info: device.bus_info().to_string(),
        nickname,
        saved_at: None,
        options,
        controls: SavedControls { control: controls },
        stream,
    }
}
