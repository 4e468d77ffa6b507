//! Tests for `stylusd::hotplug` - enumeration diffing.

mod common;

use common::{MockBackend, MockDevice};
use stylusd::hid::HidDeviceInfo;
use stylusd::hotplug::{DeviceWatcher, diff};

fn info(path: &str) -> HidDeviceInfo {
    HidDeviceInfo {
        path: path.to_string(),
        ..HidDeviceInfo::default()
    }
}

#[test]
fn test_diff_added_and_removed() {
    let before = [info("a"), info("b")];
    let after = [info("b"), info("c")];
    let changes = diff(&before, &after);
    assert_eq!(changes.added, vec![info("c")]);
    assert_eq!(changes.removed, vec![info("a")]);
}

#[test]
fn test_diff_identical_is_empty() {
    let list = [info("a"), info("b")];
    assert!(diff(&list, &list).is_empty());
}

#[test]
fn test_watcher_seeded_with_current_devices() {
    let backend = MockBackend::new();
    backend.add(MockDevice::new("/dev/hidraw0", 0x056A, 0x0027));
    let mut watcher = DeviceWatcher::new(&*backend);
    assert_eq!(watcher.poll(&*backend), None);
}

#[test]
fn test_watcher_reports_plug_and_unplug() {
    let backend = MockBackend::new();
    let mut watcher = DeviceWatcher::new(&*backend);

    backend.add(MockDevice::new("/dev/hidraw3", 0x056A, 0x0027));
    let changes = watcher.poll(&*backend).unwrap();
    assert_eq!(changes.added.len(), 1);
    assert_eq!(changes.added[0].path, "/dev/hidraw3");
    assert!(changes.removed.is_empty());
    assert_eq!(watcher.poll(&*backend), None);

    backend.remove("/dev/hidraw3");
    let changes = watcher.poll(&*backend).unwrap();
    assert!(changes.added.is_empty());
    assert_eq!(changes.removed[0].path, "/dev/hidraw3");
}
