//! Detection orchestrator: matches the catalog against connected devices, owns
//! the readers and routes their reports into the output pipeline.
//!
//! State moves `Idle -> Matched -> Idle` (on disconnect). The current
//! [`TabletState`] and the [`OutputPipeline`] are swapped as whole values so
//! the reader threads never observe a half-applied update.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::hid::{HidBackend, HidDeviceInfo, HidError};
use crate::hotplug::DevicesChanged;
use crate::matcher::{DeviceRole, MatchedDevice, Platform, match_identifiers};
use crate::output::OutputPipeline;
use crate::reader::{DeviceReader, ReadingCallback, ReportCallback};
use crate::report::DeviceReport;
use crate::tablet::{DeviceIdentifier, TabletConfiguration, TabletState};

/// Notifications published to subscribers.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A decoded report, before any filtering.
    ReportReceived { role: DeviceRole, report: DeviceReport },
    /// The matched tablet changed; `None` when it was cleared.
    TabletChanged(Option<Arc<TabletState>>),
    /// The digitizer stream went up or down.
    ReadingChanged(bool),
    DevicesChanged(DevicesChanged),
}

/// State shared with the reader threads.
struct Shared {
    tablet: RwLock<Option<Arc<TabletState>>>,
    pipeline: Mutex<Option<OutputPipeline>>,
    enable_input: AtomicBool,
    /// Set when the digitizer stream dropped on its own.
    redetect_pending: AtomicBool,
    subscribers: Mutex<Vec<Sender<DriverEvent>>>,
}

impl Shared {
    fn emit(&self, event: DriverEvent) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        // Dropped receivers unsubscribe themselves.
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn tablet(&self) -> Option<Arc<TabletState>> {
        self.tablet.read().clone()
    }

    fn set_tablet(&self, tablet: Option<Arc<TabletState>>) {
        match &tablet {
            Some(state) => info!("Tablet set to '{}'", state.name()),
            None => {
                info!("Tablet cleared");
                if let Some(pipeline) = self.pipeline.lock().as_mut() {
                    pipeline.release();
                }
            }
        }
        *self.tablet.write() = tablet.clone();
        self.emit(DriverEvent::TabletChanged(tablet));
    }

    fn handle_report(&self, role: DeviceRole, report: &DeviceReport) {
        self.emit(DriverEvent::ReportReceived {
            role,
            report: report.clone(),
        });

        if !self.enable_input.load(Ordering::Acquire) {
            return;
        }
        let Some(tablet) = self.tablet() else {
            return;
        };
        if let Some(pipeline) = self.pipeline.lock().as_mut() {
            pipeline.handle(report, &tablet);
        }
    }
}

#[derive(Default)]
struct Readers {
    digitizer: Option<DeviceReader>,
    auxiliary: Option<DeviceReader>,
    digitizer_info: Option<HidDeviceInfo>,
}

impl Readers {
    /// Stop both readers. A digitizer that was still reading publishes
    /// `ReadingChanged(false)`, since a stopped loop stays silent.
    fn stop_all(&mut self, shared: &Shared) {
        if let Some(mut reader) = self.digitizer.take() {
            let was_reading = reader.is_reading();
            reader.stop();
            if was_reading {
                shared.emit(DriverEvent::ReadingChanged(false));
            }
        }
        if let Some(mut reader) = self.auxiliary.take() {
            reader.stop();
        }
        self.digitizer_info = None;
    }
}

pub struct Driver {
    backend: Arc<dyn HidBackend>,
    platform: Platform,
    shared: Arc<Shared>,
    readers: Mutex<Readers>,
    detect_lock: Mutex<()>,
}

impl Driver {
    pub fn new(backend: Arc<dyn HidBackend>, platform: Platform) -> Self {
        Self {
            backend,
            platform,
            shared: Arc::new(Shared {
                tablet: RwLock::new(None),
                pipeline: Mutex::new(None),
                enable_input: AtomicBool::new(true),
                redetect_pending: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
            }),
            readers: Mutex::new(Readers::default()),
            detect_lock: Mutex::new(()),
        }
    }

    /// Receive every event published from now on. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> Receiver<DriverEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    pub fn tablet(&self) -> Option<Arc<TabletState>> {
        self.shared.tablet()
    }

    /// Whether the digitizer reader is alive.
    pub fn is_reading(&self) -> bool {
        self.readers
            .lock()
            .digitizer
            .as_ref()
            .is_some_and(DeviceReader::is_reading)
    }

    /// Scan the catalog in order; the first configuration that matches wins.
    ///
    /// A detection already in progress makes this call a no-op that returns
    /// the current tablet.
    pub fn detect_tablets(
        &self,
        catalog: &[Arc<TabletConfiguration>],
    ) -> Option<Arc<TabletState>> {
        let Some(_guard) = self.detect_lock.try_lock() else {
            debug!("Detection already in progress, skipping");
            return self.tablet();
        };

        for configuration in catalog {
            if self.match_configuration(configuration) {
                return self.tablet();
            }
        }

        info!("No tablet found.");
        if self.tablet().is_none() {
            self.readers.lock().stop_all(&self.shared);
        }
        None
    }

    /// Attempt a single configuration. Returns whether it matched.
    pub fn try_match(&self, configuration: &Arc<TabletConfiguration>) -> bool {
        let Some(_guard) = self.detect_lock.try_lock() else {
            debug!("Detection already in progress, skipping");
            return false;
        };
        self.match_configuration(configuration)
    }

    /// React to a device list change: re-detect only when no tablet is matched
    /// and something was plugged in.
    pub fn on_devices_changed(
        &self,
        changes: &DevicesChanged,
        catalog: &[Arc<TabletConfiguration>],
    ) {
        self.shared.emit(DriverEvent::DevicesChanged(changes.clone()));
        if self.tablet().is_none() && !changes.added.is_empty() {
            info!("New devices detected, searching for tablets");
            self.detect_tablets(catalog);
        }
    }

    /// Run one detection pass if the digitizer dropped out since the last call
    /// and nothing has been matched since.
    ///
    /// A replug that lands on the same device path between two enumeration
    /// polls leaves the device list unchanged, so [`Driver::on_devices_changed`]
    /// never fires for it.
    pub fn retry_pending_detection(
        &self,
        catalog: &[Arc<TabletConfiguration>],
    ) -> Option<Arc<TabletState>> {
        if !self.shared.redetect_pending.swap(false, Ordering::AcqRel) {
            return None;
        }
        if let Some(tablet) = self.tablet() {
            return Some(tablet);
        }
        info!("Tablet stream lost, searching for tablets");
        self.detect_tablets(catalog)
    }

    /// Replace the output pipeline. The previous one releases any held buttons.
    pub fn set_output(&self, pipeline: Option<OutputPipeline>) {
        if let Some(p) = &pipeline {
            debug!("Output mode set to {}", p.kind());
        }
        let previous = std::mem::replace(&mut *self.shared.pipeline.lock(), pipeline);
        drop(previous);
    }

    /// Toggle whether reports reach the output pipeline. Events are published
    /// either way.
    pub fn set_input_enabled(&self, enabled: bool) {
        self.shared.enable_input.store(enabled, Ordering::Release);
        debug!("Input {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn input_enabled(&self) -> bool {
        self.shared.enable_input.load(Ordering::Acquire)
    }

    /// Read a string descriptor from the matched digitizer through a fresh handle.
    pub fn request_device_string(&self, index: u8) -> Result<String, HidError> {
        let info = self
            .readers
            .lock()
            .digitizer_info
            .clone()
            .ok_or_else(|| HidError::NotFound("no tablet is connected".to_string()))?;
        self.backend.open(&info)?.device_string(index)
    }

    /// Stop all readers, drop the output pipeline and clear the tablet.
    pub fn shutdown(&self) {
        self.readers.lock().stop_all(&self.shared);
        self.shared.redetect_pending.store(false, Ordering::Release);
        self.set_output(None);
        if self.tablet().is_some() {
            self.shared.set_tablet(None);
        }
    }

    fn match_configuration(&self, configuration: &Arc<TabletConfiguration>) -> bool {
        debug!("Searching for tablet '{}'", configuration.name);

        let digitizer = if configuration.digitizer_identifiers.is_empty() {
            None
        } else {
            match match_identifiers(
                self.backend.as_ref(),
                &configuration.digitizer_identifiers,
                &configuration.attributes,
                DeviceRole::Digitizer,
                self.platform,
            ) {
                Some(matched) => Some(matched),
                None => return false,
            }
        };
        info!("Found tablet '{}'", configuration.name);

        let auxiliary = if configuration.auxiliary_identifiers.is_empty() {
            None
        } else {
            let matched = match_identifiers(
                self.backend.as_ref(),
                &configuration.auxiliary_identifiers,
                &configuration.attributes,
                DeviceRole::Auxiliary,
                self.platform,
            );
            if matched.is_none() {
                warn!("Failed to find auxiliary device, express keys may be unavailable.");
            }
            matched
        };

        let state = Arc::new(TabletState {
            configuration: Arc::clone(configuration),
            digitizer: digitizer.as_ref().map(|(id, _)| id.clone()),
            auxiliary: auxiliary.as_ref().map(|(id, _)| id.clone()),
        });

        let mut readers = self.readers.lock();
        readers.stop_all(&self.shared);
        self.shared.redetect_pending.store(false, Ordering::Release);
        self.shared.set_tablet(Some(state));

        if let Some((identifier, device)) = digitizer {
            let info = device.info.clone();
            match self.start_reader(DeviceRole::Digitizer, &identifier, device) {
                Ok(reader) => {
                    readers.digitizer = Some(reader);
                    readers.digitizer_info = Some(info);
                }
                Err(e) => {
                    error!("Failed to start digitizer reader: {e}");
                    drop(readers);
                    self.shared.set_tablet(None);
                    return false;
                }
            }
        }

        if let Some((identifier, device)) = auxiliary {
            match self.start_reader(DeviceRole::Auxiliary, &identifier, device) {
                Ok(reader) => readers.auxiliary = Some(reader),
                Err(e) => warn!("Failed to start auxiliary reader: {e}"),
            }
        }
        true
    }

    fn start_reader(
        &self,
        role: DeviceRole,
        identifier: &DeviceIdentifier,
        device: MatchedDevice,
    ) -> std::io::Result<DeviceReader> {
        let shared = Arc::clone(&self.shared);
        let on_report: ReportCallback =
            Arc::new(move |report: &DeviceReport| shared.handle_report(role, report));

        let shared = Arc::clone(&self.shared);
        let on_reading: ReadingCallback = Arc::new(move |reading: bool| match role {
            DeviceRole::Digitizer => {
                shared.emit(DriverEvent::ReadingChanged(reading));
                if !reading {
                    shared.redetect_pending.store(true, Ordering::Release);
                    shared.set_tablet(None);
                }
            }
            DeviceRole::Auxiliary => {
                debug!("Auxiliary reader {}", if reading { "started" } else { "stopped" });
            }
        });

        DeviceReader::start(
            &role.to_string(),
            device,
            identifier.report_parser,
            identifier.input_report_length,
            on_report,
            on_reading,
        )
    }
}
