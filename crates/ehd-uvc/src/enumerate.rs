//! Video node enumeration
//!
//! Nodes are discovered through sysfs, queried for their bus info, and
//! grouped so that every physical USB device yields one `DeviceInfo`.

use ehd_core::DeviceInfo;
use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::camera::{query_capability, Capability};
use crate::error::UvcError;

pub const SYSFS_VIDEO4LINUX: &str = "/sys/class/video4linux";
pub const DEV_ROOT: &str = "/dev";

/// List USB capture devices with their nodes grouped by bus info
pub fn list_devices() -> Result<Vec<DeviceInfo>, UvcError> {
    list_devices_in(Path::new(SYSFS_VIDEO4LINUX), Path::new(DEV_ROOT), query_capability)
}

pub fn list_devices_in<F>(
    class_root: &Path,
    dev_root: &Path,
    query: F,
) -> Result<Vec<DeviceInfo>, UvcError>
where
    F: Fn(&Path) -> io::Result<Capability>,
{
    let entries = std::fs::read_dir(class_root)
        .map_err(|e| UvcError::EnumerationError(format!("{}: {}", class_root.display(), e)))?;

    let mut nodes = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("video") {
            continue;
        }
        let path = dev_root.join(&name);
        match query(&path) {
            Ok(cap) => nodes.push((path, cap)),
            Err(e) => trace!(path = %path.display(), error = %e, "Skipping node"),
        }
    }

    let devices = group_nodes(nodes);
    debug!(count = devices.len(), "Enumerated USB video devices");
    Ok(devices)
}

/// Group nodes by bus info, dropping anything not attached over USB
///
/// Paths are sorted naturally first so the output does not depend on
/// directory order, and groups keep the order of their first node.
pub fn group_nodes(mut nodes: Vec<(PathBuf, Capability)>) -> Vec<DeviceInfo> {
    nodes.sort_by(|(a, _), (b, _)| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));

    let mut devices: Vec<DeviceInfo> = Vec::new();
    for (path, cap) in nodes {
        let path = path.to_string_lossy().into_owned();
        match devices.iter_mut().find(|d| d.bus_info == cap.bus_info) {
            Some(device) => device.video_node_paths.push(path),
            None => {
                let mut device = DeviceInfo::new(cap.card, cap.bus_info);
                if !device.is_usb() {
                    continue;
                }
                device.video_node_paths.push(path);
                devices.push(device);
            }
        }
    }
    devices
}

/// Compare strings treating runs of digits as numbers (`video2 < video10`)
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_number(&mut a);
                let right = take_number(&mut b);
                // Compare by length first so arbitrarily long runs never overflow
                let ordering = left
                    .len()
                    .cmp(&right.len())
                    .then_with(|| left.cmp(&right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
