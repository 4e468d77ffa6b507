//! Daemon logger: `[secs LEVEL module] message` lines on stderr, mirrored to an
//! optional append-mode file.
use std::fs::File;
use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use log::{LevelFilter, Log, Metadata, Record};

pub struct StylusdLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
    /// Set after the first failed file write; later failures stay quiet.
    file_failed: AtomicBool,
}

impl StylusdLogger {
    pub fn new(level: LevelFilter, file: Option<File>) -> Self {
        Self {
            level,
            file: file.map(Mutex::new),
            file_failed: AtomicBool::new(false),
        }
    }

    /// Whether writing to the log file has failed at least once.
    pub fn file_failed(&self) -> bool {
        self.file_failed.load(Ordering::Relaxed)
    }

    fn with_file(&self, op: impl FnOnce(&mut File) -> std::io::Result<()>) {
        let Some(file) = &self.file else {
            return;
        };
        let result = match file.lock() {
            Ok(mut f) => op(&mut f),
            Err(_) => Err(std::io::Error::other("log file lock poisoned")),
        };
        if let Err(e) = result {
            if !self.file_failed.swap(true, Ordering::Relaxed) {
                eprintln!("Warning: writing to the log file failed, continuing on stderr only: {e}");
            }
        }
    }
}

/// Format one log line. The module is the target without the crate prefix.
pub fn format_line(secs: u64, record: &Record) -> String {
    let module = record
        .target()
        .strip_prefix("stylusd::")
        .unwrap_or("stylusd");
    format!("[{secs} {} {module}] {}\n", record.level(), record.args())
}

impl Log for StylusdLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("stylusd")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let line = format_line(secs, record);

        // stderr ends up in journald under systemd
        eprint!("{line}");
        self.with_file(|f| f.write_all(line.as_bytes()));
    }

    fn flush(&self) {
        self.with_file(|f| f.flush());
    }
}
