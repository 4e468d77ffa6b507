//! Daemon wiring: settings and catalog in, driver and hot-plug loop running.
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::binding::BindingHandler;
use crate::config::{AppSettings, StylusdError, parse_catalog_dir, parse_settings_file};
use crate::driver::Driver;
use crate::filter::{Filter, FilterRegistry};
use crate::hid::{HidApiBackend, HidBackend};
use crate::hotplug::DeviceWatcher;
use crate::matcher::Platform;
use crate::output::{AbsoluteMode, OutputMode, OutputModeKind, OutputPipeline, RelativeMode};
use crate::pointer::{EvdevPointer, Pointer};
use crate::tablet::TabletConfiguration;

/// Granularity at which the main loop notices the running flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Build the configured filters in order.
pub fn build_filters(
    settings: &AppSettings,
    registry: &FilterRegistry,
) -> Result<Vec<Box<dyn Filter>>, StylusdError> {
    settings
        .output
        .filters
        .iter()
        .map(|f| {
            debug!("Adding filter '{}'", f.name);
            registry.construct(&f.name, &f.params).map_err(StylusdError::from)
        })
        .collect()
}

/// Build the output pipeline from settings around an existing pointer.
pub fn build_pipeline(
    settings: &AppSettings,
    registry: &FilterRegistry,
    pointer: Box<dyn Pointer>,
) -> Result<OutputPipeline, StylusdError> {
    let filters = build_filters(settings, registry)?;
    let output = &settings.output;
    let mode: Box<dyn OutputMode> = match output.mode {
        OutputModeKind::Absolute => {
            let mut mode = AbsoluteMode::new(output.absolute.display);
            mode.input = output.absolute.tablet;
            mode.clipping = output.absolute.clipping;
            mode.limiting = output.absolute.limiting;
            mode.filters = filters;
            Box::new(mode)
        }
        OutputModeKind::Relative => {
            let mut mode = RelativeMode::new(
                output.relative.sensitivity,
                output.relative.rotation,
                output.relative.reset_time,
            );
            mode.filters = filters;
            Box::new(mode)
        }
    };
    Ok(OutputPipeline::new(mode, pointer).with_bindings(BindingHandler::new(settings.bindings.clone())))
}

/// Create the uinput pointer matching the configured mode.
fn create_pointer(settings: &AppSettings) -> Result<Box<dyn Pointer>, StylusdError> {
    let pointer = match settings.output.mode {
        OutputModeKind::Absolute => {
            let display = settings.output.absolute.display;
            let extent_x = (display.position.x + display.width / 2.0).ceil().max(1.0);
            let extent_y = (display.position.y + display.height / 2.0).ceil().max(1.0);
            EvdevPointer::absolute(extent_x as u32, extent_y as u32)?
        }
        OutputModeKind::Relative => EvdevPointer::relative()?,
    };
    Ok(Box::new(pointer))
}

/// Top-level daemon.
pub struct TabletDaemon {
    settings: AppSettings,
    catalog: Vec<Arc<TabletConfiguration>>,
    running: Arc<AtomicBool>,
}

impl TabletDaemon {
    pub fn new(config_path: impl AsRef<Path>) -> Result<Self, StylusdError> {
        let settings = parse_settings_file(config_path.as_ref())?;
        let catalog = parse_catalog_dir(&settings.catalog_dir)?;
        Ok(Self {
            settings,
            catalog,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Open the platform HID stack and the virtual pointer, then run until stopped.
    pub fn start(&mut self) -> Result<(), StylusdError> {
        self.running.store(true, Ordering::Relaxed);
        info!(
            "Starting tablet daemon with {} tablet configuration(s)",
            self.catalog.len()
        );

        let backend: Arc<dyn HidBackend> = Arc::new(HidApiBackend::new()?);
        let driver = Driver::new(Arc::clone(&backend), Platform::current());
        driver.set_input_enabled(self.settings.enable_input);
        driver.set_output(Some(build_pipeline(
            &self.settings,
            &FilterRegistry::with_builtins(),
            create_pointer(&self.settings)?,
        )?));

        self.run(&driver, backend.as_ref());
        Ok(())
    }

    /// Detect once, then poll for device changes until the running flag clears.
    pub fn run(&self, driver: &Driver, backend: &dyn HidBackend) {
        let mut watcher = DeviceWatcher::new(backend);
        if driver.detect_tablets(&self.catalog).is_none() {
            info!("Waiting for a tablet to be connected");
        }

        let mut last_poll = Instant::now();
        while self.running.load(Ordering::Relaxed) {
            thread::sleep(SHUTDOWN_POLL.min(self.settings.hotplug_interval));
            if last_poll.elapsed() < self.settings.hotplug_interval {
                continue;
            }
            last_poll = Instant::now();
            if let Some(changes) = watcher.poll(backend) {
                driver.on_devices_changed(&changes, &self.catalog);
            }
            driver.retry_pending_detection(&self.catalog);
        }

        driver.shutdown();
        info!("Tablet daemon stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Get a reference to the running flag for signal handling.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &[Arc<TabletConfiguration>] {
        &self.catalog
    }

    pub fn config_log_level(&self) -> &str {
        &self.settings.log_level
    }

    pub fn config_log_file(&self) -> Option<&str> {
        self.settings.log_file.as_deref()
    }
}

/// Print every HID device the platform exposes.
pub fn list_hid_devices() -> ExitCode {
    let devices = match HidApiBackend::new().and_then(|backend| backend.enumerate()) {
        Ok(devices) => devices,
        Err(e) => {
            error!("HID enumeration failed: {e}");
            eprintln!("Error: HID enumeration failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("\n=== stylusd: Available HID Devices ===\n");
    for (index, device) in devices.iter().enumerate() {
        println!(
            "Device {}:\n\
             \x20 Path:         {}\n\
             \x20 USB ID:       {:04x}:{:04x}\n\
             \x20 Product:      {}\n\
             \x20 Manufacturer: {}\n\
             \x20 Usage:        {:04x}:{:04x}\n",
            index + 1,
            device.path,
            device.vendor_id,
            device.product_id,
            device.product.as_deref().unwrap_or("unknown"),
            device.manufacturer.as_deref().unwrap_or("unknown"),
            device.usage_page,
            device.usage,
        );
    }

    if devices.is_empty() {
        println!(
            "No HID devices found.\n\n\
             Troubleshooting:\n\
             \x20 - Check if the tablet is connected\n\
             \x20 - Check the hidraw permissions (udev rules)\n\
             \x20 - Run as root if devices are not visible"
        );
        return ExitCode::FAILURE;
    }

    println!(
        "Found {} HID device(s).\n\n\
         Add the vendor and product ID to a tablet configuration:\n\
         \x20 [[digitizer]]\n\
         \x20 vendor_id = 0x<vendor>\n\
         \x20 product_id = 0x<product>",
        devices.len()
    );
    ExitCode::SUCCESS
}
