//! Hot-plug diffing by USB bus identity

use ehd_core::DeviceInfo;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDiff {
    pub added: Vec<DeviceInfo>,
    pub removed: Vec<DeviceInfo>,
}

impl DeviceDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

fn contains(devices: &[DeviceInfo], bus_info: &str) -> bool {
    devices.iter().any(|d| d.bus_info == bus_info)
}

/// Devices present now that were not in the last snapshot
pub fn added_devices(last: &[DeviceInfo], current: &[DeviceInfo]) -> Vec<DeviceInfo> {
    current
        .iter()
        .filter(|d| !contains(last, &d.bus_info))
        .cloned()
        .collect()
}

/// Devices in the last snapshot that are gone now
pub fn removed_devices(last: &[DeviceInfo], current: &[DeviceInfo]) -> Vec<DeviceInfo> {
    last.iter()
        .filter(|d| !contains(current, &d.bus_info))
        .cloned()
        .collect()
}
