//! Tests for `stylusd::daemon` - pipeline construction from settings and the
//! detection loop against the simulated backend.

mod common;

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use common::{Command, MockBackend, MockDevice, RecordingPointer, pen, specs, tablet_state};
use stylusd::config::{AppSettings, StylusdError, parse_settings_file};
use stylusd::daemon::{TabletDaemon, build_filters, build_pipeline};
use stylusd::driver::Driver;
use stylusd::filter::FilterRegistry;
use stylusd::geometry::Point;
use stylusd::matcher::Platform;
use stylusd::output::OutputModeKind;
use stylusd::pointer::MouseButton;
use stylusd::report::DeviceReport;

// ── Helpers ──────────────────────────────────────────────────

fn settings(toml_content: &str) -> AppSettings {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(toml_content.as_bytes()).unwrap();
    f.flush().unwrap();
    parse_settings_file(f.path()).unwrap()
}

fn write_catalog(dir: &Path) {
    std::fs::write(
        dir.join("wacom.toml"),
        r#"
name = "Wacom CTE-440"

[specifications]
width = 127.0
height = 88.0
max_x = 12700
max_y = 8800
max_pressure = 511

[[digitizer]]
vendor_id = 0x056A
product_id = 0x0027
"#,
    )
    .unwrap();
}

// ── Pipeline construction ────────────────────────────────────

#[test]
fn test_build_pipeline_absolute_with_bindings() {
    let settings = settings("");
    let pointer = RecordingPointer::default();
    let mut pipeline =
        build_pipeline(&settings, &FilterRegistry::with_builtins(), Box::new(pointer.clone()))
            .unwrap();
    assert_eq!(pipeline.kind(), OutputModeKind::Absolute);

    pipeline.handle(&DeviceReport::Tablet(pen(5000, 2500)), &tablet_state(specs()));
    assert_eq!(
        pointer.commands(),
        vec![
            Command::Absolute(Point::new(960.0, 540.0)),
            Command::Button(MouseButton::Left, true),
        ]
    );
}

#[test]
fn test_build_pipeline_relative() {
    let settings = settings("[output]\nmode = \"relative\"\n");
    let pipeline = build_pipeline(
        &settings,
        &FilterRegistry::with_builtins(),
        Box::new(RecordingPointer::default()),
    )
    .unwrap();
    assert_eq!(pipeline.kind(), OutputModeKind::Relative);
}

#[test]
fn test_build_filters_in_order() {
    let settings = settings(
        r#"
[[filters]]
name = "offset"
x = 1.0

[[filters]]
name = "scale"
x = 10.0
y = 10.0
"#,
    );
    let filters = build_filters(&settings, &FilterRegistry::with_builtins()).unwrap();
    let out = stylusd::filter::apply_filters(&filters, Point::new(1.0, 1.0));
    assert_eq!(out, Point::new(20.0, 10.0));
}

#[test]
fn test_unknown_filter_rejected() {
    let settings = settings("[[filters]]\nname = \"smooth\"\n");
    let err = build_pipeline(
        &settings,
        &FilterRegistry::with_builtins(),
        Box::new(RecordingPointer::default()),
    )
    .unwrap_err();
    assert!(matches!(err, StylusdError::Filter(_)));
}

// ── Daemon ───────────────────────────────────────────────────

#[test]
fn test_daemon_loads_settings_and_catalog() {
    let catalog_dir = tempfile::tempdir().unwrap();
    write_catalog(catalog_dir.path());
    let mut f = NamedTempFile::new().unwrap();
    write!(
        f,
        "[global]\nlog_level = \"debug\"\ncatalog_dir = \"{}\"\n",
        catalog_dir.path().display()
    )
    .unwrap();
    f.flush().unwrap();

    let daemon = TabletDaemon::new(f.path()).unwrap();
    assert_eq!(daemon.config_log_level(), "debug");
    assert_eq!(daemon.config_log_file(), None);
    assert_eq!(daemon.catalog().len(), 1);
    assert_eq!(daemon.catalog()[0].specifications.max_pressure, 511);
    assert!(!daemon.running_flag().load(std::sync::atomic::Ordering::Relaxed));
}

#[test]
fn test_daemon_run_detects_then_shuts_down_when_stopped() {
    let catalog_dir = tempfile::tempdir().unwrap();
    write_catalog(catalog_dir.path());
    let mut f = NamedTempFile::new().unwrap();
    write!(f, "[global]\ncatalog_dir = \"{}\"\n", catalog_dir.path().display()).unwrap();
    f.flush().unwrap();
    let daemon = TabletDaemon::new(f.path()).unwrap();

    let backend = MockBackend::new();
    backend.add(MockDevice::new("/dev/hidraw0", 0x056A, 0x0027));
    let driver = Driver::new(backend.clone(), Platform::Linux);
    let events = driver.subscribe();

    daemon.stop();
    daemon.run(&driver, &*backend);

    let names: Vec<Option<String>> = events
        .try_iter()
        .filter_map(|e| match e {
            stylusd::driver::DriverEvent::TabletChanged(t) => Some(t.map(|t| t.name().to_string())),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec![Some("Wacom CTE-440".to_string()), None]);
    assert!(driver.tablet().is_none());
}
