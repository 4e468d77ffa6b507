//! Device list change detection by polling enumeration.
use std::collections::BTreeSet;

use log::{debug, warn};

use crate::hid::{HidBackend, HidDeviceInfo};

/// Devices that appeared or disappeared between two enumerations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicesChanged {
    pub added: Vec<HidDeviceInfo>,
    pub removed: Vec<HidDeviceInfo>,
}

impl DevicesChanged {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare two enumerations by device path.
pub fn diff(previous: &[HidDeviceInfo], current: &[HidDeviceInfo]) -> DevicesChanged {
    let before: BTreeSet<&str> = previous.iter().map(|d| d.path.as_str()).collect();
    let after: BTreeSet<&str> = current.iter().map(|d| d.path.as_str()).collect();
    DevicesChanged {
        added: current
            .iter()
            .filter(|d| !before.contains(d.path.as_str()))
            .cloned()
            .collect(),
        removed: previous
            .iter()
            .filter(|d| !after.contains(d.path.as_str()))
            .cloned()
            .collect(),
    }
}

/// Remembers the last enumeration and reports what changed since.
#[derive(Debug, Default)]
pub struct DeviceWatcher {
    known: Vec<HidDeviceInfo>,
}

impl DeviceWatcher {
    /// Watcher seeded with the current device list, so the first poll only
    /// reports real changes.
    pub fn new(backend: &dyn HidBackend) -> Self {
        let known = backend.enumerate().unwrap_or_else(|e| {
            warn!("HID enumeration failed: {e}");
            Vec::new()
        });
        Self { known }
    }

    pub fn poll(&mut self, backend: &dyn HidBackend) -> Option<DevicesChanged> {
        let current = match backend.enumerate() {
            Ok(devices) => devices,
            Err(e) => {
                debug!("HID enumeration failed: {e}");
                return None;
            }
        };
        let changes = diff(&self.known, &current);
        self.known = current;
        if changes.is_empty() {
            None
        } else {
            debug!(
                "Devices changed: {} added, {} removed",
                changes.added.len(),
                changes.removed.len()
            );
            Some(changes)
        }
    }
}
