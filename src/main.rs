//! stylusd – Userspace graphics tablet driver.
//!
//! CLI entry point.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::Parser;
use log::LevelFilter;

use stylusd::daemon::{TabletDaemon, list_hid_devices};
use stylusd::logger::StylusdLogger;

#[derive(Parser)]
#[command(name = "stylusd", about = "Userspace graphics tablet driver")]
struct Cli {
    /// Path to settings file
    #[arg(default_value = "/etc/stylusd/stylusd.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List available HID devices and exit
    #[arg(short, long)]
    list_devices: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_devices {
        return list_hid_devices();
    }

    // Parse settings first (before logger init) so we can read the configured log level.
    let mut daemon = match TabletDaemon::new(&cli.config) {
        Ok(d) => d,
        Err(e) => {
            eprintln!(
                "Error: {e}\n\n\
                 To find available HID devices, run:\n\
                 \x20 stylusd --list-devices"
            );
            return ExitCode::FAILURE;
        }
    };

    // CLI --verbose overrides the settings file.
    let log_level: LevelFilter = if cli.verbose {
        LevelFilter::Debug
    } else {
        daemon
            .config_log_level()
            .parse()
            .unwrap_or(LevelFilter::Info)
    };

    let log_file = daemon.config_log_file().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Warning: cannot open log file '{path}': {e}");
                None
            }
        }
    });

    let logger = StylusdLogger::new(log_level, log_file);
    if let Err(e) = log::set_boxed_logger(Box::new(logger)) {
        eprintln!("Error: failed to set logger: {e}");
        return ExitCode::FAILURE;
    }
    log::set_max_level(log_level);

    let running = daemon.running_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::Relaxed);
    }) {
        eprintln!("Error: failed to set Ctrl-C handler: {e}");
        return ExitCode::FAILURE;
    }

    log::info!("Loaded settings from: {}", cli.config.display());
    match daemon.start() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
