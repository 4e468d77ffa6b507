//! Tests for `stylusd::logger` - line format, target filtering and log file
//! failures.

use std::fs::File;

use log::{Level, LevelFilter, Log, Record};
use tempfile::NamedTempFile;

use stylusd::logger::{StylusdLogger, format_line};

fn log_line(logger: &StylusdLogger, level: Level, target: &str, message: &str) {
    logger.log(
        &Record::builder()
            .level(level)
            .target(target)
            .args(format_args!("{message}"))
            .build(),
    );
}

#[test]
fn test_format_strips_crate_prefix() {
    let line = format_line(
        42,
        &Record::builder()
            .level(Level::Warn)
            .target("stylusd::driver")
            .args(format_args!("Tablet cleared"))
            .build(),
    );
    assert_eq!(line, "[42 WARN driver] Tablet cleared\n");
}

#[test]
fn test_lines_written_to_file_by_level_and_target() {
    let tmp = NamedTempFile::new().unwrap();
    let logger = StylusdLogger::new(LevelFilter::Info, Some(tmp.reopen().unwrap()));

    log_line(&logger, Level::Info, "stylusd::reader", "kept");
    log_line(&logger, Level::Debug, "stylusd::reader", "too verbose");
    log_line(&logger, Level::Error, "hidapi", "other crate");
    logger.flush();

    let content = std::fs::read_to_string(tmp.path()).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("INFO reader] kept"));
    assert!(!logger.file_failed());
}

#[test]
fn test_unwritable_file_is_reported_not_fatal() {
    let tmp = NamedTempFile::new().unwrap();
    // Opened read-only, so every write fails.
    let read_only = File::open(tmp.path()).unwrap();
    let logger = StylusdLogger::new(LevelFilter::Info, Some(read_only));

    log_line(&logger, Level::Info, "stylusd", "first");
    assert!(logger.file_failed());
    log_line(&logger, Level::Info, "stylusd", "second");
    assert!(logger.file_failed());
    assert_eq!(std::fs::read_to_string(tmp.path()).unwrap(), "");
}
