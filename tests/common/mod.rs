//! Shared test doubles: simulated HID backend, recording pointer, fake clock
//! and a per-thread capturing logger.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{Level, LevelFilter, Log, Metadata, Record};

use stylusd::codec::ReportParser;
use stylusd::descriptor::ReportLengths;
use stylusd::geometry::Point;
use stylusd::hid::{HidBackend, HidDeviceInfo, HidError, HidStream};
use stylusd::output::Clock;
use stylusd::pointer::{MouseButton, Pointer, PointerError};
use stylusd::report::TabletReport;
use stylusd::tablet::{DeviceIdentifier, TabletConfiguration, TabletSpecifications, TabletState};

// ── Simulated HID backend ────────────────────────────────────

pub type Feed = Sender<Result<Vec<u8>, HidError>>;

/// A scripted device. Every opened stream reads from the same feed.
#[derive(Clone)]
pub struct MockDevice {
    pub info: HidDeviceInfo,
    pub access_error: Option<HidError>,
    pub open_error: Option<HidError>,
    pub strings: BTreeMap<u8, String>,
    pub lengths: ReportLengths,
    feed_tx: Feed,
    feed_rx: Receiver<Result<Vec<u8>, HidError>>,
    pub features: Arc<Mutex<Vec<Vec<u8>>>>,
    pub writes: Arc<Mutex<Vec<Vec<u8>>>>,
    pub opens: Arc<AtomicUsize>,
}

impl MockDevice {
    pub fn new(path: &str, vendor_id: u16, product_id: u16) -> Self {
        let (feed_tx, feed_rx) = unbounded();
        Self {
            info: HidDeviceInfo {
                path: path.to_string(),
                vendor_id,
                product_id,
                product: Some("Mock Tablet".to_string()),
                manufacturer: Some("Mock".to_string()),
                ..HidDeviceInfo::default()
            },
            access_error: None,
            open_error: None,
            strings: BTreeMap::new(),
            lengths: ReportLengths::default(),
            feed_tx,
            feed_rx,
            features: Arc::new(Mutex::new(Vec::new())),
            writes: Arc::new(Mutex::new(Vec::new())),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn input_length(mut self, len: usize) -> Self {
        self.lengths.input = Some(len);
        self
    }

    pub fn string(mut self, index: u8, value: &str) -> Self {
        self.strings.insert(index, value.to_string());
        self
    }

    /// Fails the read-capability check.
    pub fn deny_access(mut self, err: HidError) -> Self {
        self.access_error = Some(err);
        self
    }

    /// Passes the capability check but fails the real open.
    pub fn fail_open(mut self, err: HidError) -> Self {
        self.open_error = Some(err);
        self
    }

    pub fn feed(&self) -> Feed {
        self.feed_tx.clone()
    }
}

#[derive(Default)]
pub struct MockBackend {
    devices: Mutex<Vec<MockDevice>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, device: MockDevice) {
        self.devices.lock().unwrap().push(device);
    }

    pub fn remove(&self, path: &str) {
        self.devices.lock().unwrap().retain(|d| d.info.path != path);
    }

    fn find(&self, info: &HidDeviceInfo) -> Result<MockDevice, HidError> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.info.path == info.path)
            .cloned()
            .ok_or_else(|| HidError::NotFound(info.path.clone()))
    }
}

impl HidBackend for MockBackend {
    fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, HidError> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.info.clone())
            .collect())
    }

    fn can_open(&self, device: &HidDeviceInfo) -> Result<(), HidError> {
        match self.find(device)?.access_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn report_lengths(&self, device: &HidDeviceInfo) -> Result<ReportLengths, HidError> {
        Ok(self.find(device)?.lengths)
    }

    fn open(&self, device: &HidDeviceInfo) -> Result<Box<dyn HidStream>, HidError> {
        let mock = self.find(device)?;
        if let Some(err) = mock.access_error.or(mock.open_error) {
            return Err(err);
        }
        mock.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            feed: mock.feed_rx,
            strings: mock.strings,
            features: mock.features,
            writes: mock.writes,
        }))
    }
}

struct MockStream {
    feed: Receiver<Result<Vec<u8>, HidError>>,
    strings: BTreeMap<u8, String>,
    features: Arc<Mutex<Vec<Vec<u8>>>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl HidStream for MockStream {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, HidError> {
        match self.feed.recv_timeout(timeout) {
            Ok(Ok(bytes)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(len)
            }
            Ok(Err(err)) => Err(err),
            Err(RecvTimeoutError::Timeout) => Ok(0),
            Err(RecvTimeoutError::Disconnected) => Err(HidError::Disconnected),
        }
    }

    fn set_feature(&mut self, report: &[u8]) -> Result<(), HidError> {
        self.features.lock().unwrap().push(report.to_vec());
        Ok(())
    }

    fn write(&mut self, report: &[u8]) -> Result<(), HidError> {
        self.writes.lock().unwrap().push(report.to_vec());
        Ok(())
    }

    fn device_string(&mut self, index: u8) -> Result<String, HidError> {
        self.strings
            .get(&index)
            .cloned()
            .ok_or_else(|| HidError::Io(format!("no string at index {index}")))
    }
}

// ── Recording pointer ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Absolute(Point),
    Relative(Point),
    Button(MouseButton, bool),
}

#[derive(Clone, Default)]
pub struct RecordingPointer {
    pub log: Arc<Mutex<Vec<Command>>>,
    /// What `current_position` reports.
    pub position: Option<Point>,
}

impl RecordingPointer {
    pub fn commands(&self) -> Vec<Command> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

impl Pointer for RecordingPointer {
    fn set_absolute_position(&mut self, position: Point) -> Result<(), PointerError> {
        self.log.lock().unwrap().push(Command::Absolute(position));
        Ok(())
    }

    fn move_relative(&mut self, delta: Point) -> Result<(), PointerError> {
        self.log.lock().unwrap().push(Command::Relative(delta));
        Ok(())
    }

    fn current_position(&self) -> Option<Point> {
        self.position
    }

    fn set_button(&mut self, button: MouseButton, pressed: bool) -> Result<(), PointerError> {
        self.log.lock().unwrap().push(Command::Button(button, pressed));
        Ok(())
    }
}

// ── Fake clock ───────────────────────────────────────────────

pub struct FakeClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl FakeClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

// ── Capturing logger ─────────────────────────────────────────

thread_local! {
    static CAPTURED: RefCell<Option<Vec<(Level, String)>>> = const { RefCell::new(None) };
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|captured| {
            if let Some(lines) = captured.borrow_mut().as_mut() {
                lines.push((record.level(), record.args().to_string()));
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Run `f` and return what it logged on this thread.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<(Level, String)>) {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
    let result = f();
    let lines = CAPTURED.with(|c| c.borrow_mut().take().unwrap_or_default());
    (result, lines)
}

pub fn warnings(lines: &[(Level, String)]) -> Vec<&str> {
    lines
        .iter()
        .filter(|(level, _)| *level <= Level::Warn)
        .map(|(_, msg)| msg.as_str())
        .collect()
}

// ── Fixtures ─────────────────────────────────────────────────

/// 100 x 50 mm tablet with a 10000 x 5000 raw range.
pub fn specs() -> TabletSpecifications {
    TabletSpecifications {
        width: 100.0,
        height: 50.0,
        max_x: 10000.0,
        max_y: 5000.0,
        max_pressure: 1000,
        minimum_range: 0,
        pen_buttons: 2,
        aux_buttons: 4,
    }
}

pub fn configuration(name: &str, digitizers: Vec<DeviceIdentifier>) -> Arc<TabletConfiguration> {
    Arc::new(TabletConfiguration {
        name: name.to_string(),
        specifications: specs(),
        digitizer_identifiers: digitizers,
        auxiliary_identifiers: Vec::new(),
        attributes: BTreeMap::new(),
    })
}

pub fn tablet_state(specifications: TabletSpecifications) -> TabletState {
    TabletState {
        configuration: Arc::new(TabletConfiguration {
            name: "Test Tablet".to_string(),
            specifications,
            digitizer_identifiers: Vec::new(),
            auxiliary_identifiers: Vec::new(),
            attributes: BTreeMap::new(),
        }),
        digitizer: Some(DeviceIdentifier::new(0x056A, 0x0027, ReportParser::Tablet)),
        auxiliary: None,
    }
}

/// A touching pen report at raw `(x, y)`.
pub fn pen(x: u32, y: u32) -> TabletReport {
    TabletReport {
        x,
        y,
        pressure: 500,
        lift: 500,
        in_range: true,
        ..TabletReport::default()
    }
}

pub fn assert_close(actual: Point, expected: Point) {
    assert!(
        actual.distance_to(expected) < 1e-6,
        "expected {expected}, got {actual}"
    );
}

/// Generic status-byte pen report: in range, tip down.
pub fn status_report(x: u16, y: u16, pressure: u16) -> Vec<u8> {
    let mut data = vec![0x02, 0xA1];
    data.extend_from_slice(&x.to_le_bytes());
    data.extend_from_slice(&y.to_le_bytes());
    data.extend_from_slice(&pressure.to_le_bytes());
    data
}
