//! Device report reader: one dedicated thread per opened device.
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::codec::ReportParser;
use crate::hid::HidStream;
use crate::matcher::MatchedDevice;
use crate::report::DeviceReport;

/// Upper bound a single blocking read waits before re-checking the stop flag.
/// This bounds shutdown latency; it is not a device liveness timeout.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Pause after a transient read error so a persistently failing device does not spin.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Buffer size used when neither the identifier nor the codec pins one down.
const DEFAULT_BUFFER_LEN: usize = 64;

pub type ReportCallback = Arc<dyn Fn(&DeviceReport) + Send + Sync>;
pub type ReadingCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Owns one opened device stream and the thread reading from it.
pub struct DeviceReader {
    name: String,
    path: String,
    stop_requested: Arc<AtomicBool>,
    reading: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceReader {
    /// Spawn the read loop.
    ///
    /// `on_report` fires once per decoded report, in hardware order, on the reader
    /// thread. `on_reading` fires with `true` when the loop starts and with `false`
    /// if it ends on its own (device removed), but not after [`DeviceReader::stop`].
    pub fn start(
        name: &str,
        device: MatchedDevice,
        parser: ReportParser,
        buffer_len: Option<usize>,
        on_report: ReportCallback,
        on_reading: ReadingCallback,
    ) -> io::Result<Self> {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let reading = Arc::new(AtomicBool::new(true));
        let buffer_len = buffer_len
            .unwrap_or(DEFAULT_BUFFER_LEN)
            .max(parser.min_length());

        let MatchedDevice { info, stream } = device;
        let loop_state = ReadLoop {
            name: name.to_string(),
            stream,
            parser,
            buffer: vec![0; buffer_len],
            stop_requested: Arc::clone(&stop_requested),
            reading: Arc::clone(&reading),
            on_report,
            on_reading,
        };

        (loop_state.on_reading)(true);
        let handle = thread::Builder::new()
            .name(format!("reader-{name}"))
            .spawn(move || loop_state.run())?;

        Ok(Self {
            name: name.to_string(),
            path: info.path,
            stop_requested,
            reading,
            handle: Some(handle),
        })
    }

    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Signal the loop to exit and wait for it. Completes within one
    /// [`POLL_INTERVAL`] even when the device is silent.
    pub fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Reader '{}' panicked", self.name);
            }
            debug!("Reader '{}' stopped", self.name);
        }
        self.reading.store(false, Ordering::Release);
    }
}

impl Drop for DeviceReader {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ReadLoop {
    name: String,
    stream: Box<dyn HidStream>,
    parser: ReportParser,
    buffer: Vec<u8>,
    stop_requested: Arc<AtomicBool>,
    reading: Arc<AtomicBool>,
    on_report: ReportCallback,
    on_reading: ReadingCallback,
}

impl ReadLoop {
    fn run(mut self) {
        while !self.stop_requested.load(Ordering::Acquire) {
            match self.stream.read(&mut self.buffer, POLL_INTERVAL) {
                Ok(0) => {}
                Ok(len) => match self.parser.decode(&self.buffer[..len]) {
                    Ok(report) => (self.on_report)(&report),
                    Err(e) => debug!("{}: dropped report: {e}", self.name),
                },
                Err(e) if e.is_fatal() => {
                    info!("{}: stopped reading: {e}", self.name);
                    break;
                }
                Err(e) => {
                    warn!("{}: read error: {e}", self.name);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        self.reading.store(false, Ordering::Release);
        if !self.stop_requested.load(Ordering::Acquire) {
            (self.on_reading)(false);
        }
    }
}
