//! HID access layer.
//!
//! The driver core only talks to the [`HidBackend`] / [`HidStream`] traits, so
//! detection and reading can run against simulated devices. [`HidApiBackend`]
//! is the production implementation on top of `hidapi`.
use std::ffi::CString;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::descriptor::{ReportLengths, report_lengths};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HidError {
    #[error("permission denied opening {path}")]
    PermissionDenied { path: String },

    #[error("device {path} is in use by another driver")]
    Busy { path: String },

    #[error("device disconnected")]
    Disconnected,

    #[error("device not found: {0}")]
    NotFound(String),

    #[error("HID I/O error: {0}")]
    Io(String),

    #[error("HID backend error: {0}")]
    Backend(String),
}

impl HidError {
    /// The device is gone; further reads cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HidError::Disconnected | HidError::NotFound(_))
    }

    /// The device exists but this process may not use it.
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            HidError::PermissionDenied { .. } | HidError::Busy { .. }
        )
    }

    /// Actionable advice for access errors.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            HidError::PermissionDenied { .. } => Some(
                "The current user cannot open HID device streams. Install udev rules \
                 granting access to the tablet's hidraw nodes, then replug the tablet.",
            ),
            HidError::Busy { .. } => Some(
                "The device is claimed by another kernel module or driver. Unload the \
                 conflicting module (e.g. hid-uclogic, wacom) or stop the other tablet driver.",
            ),
            _ => None,
        }
    }
}

/// One enumerated HID interface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HidDeviceInfo {
    /// Platform device path; unique per interface.
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product: Option<String>,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
    pub interface_number: Option<i32>,
    pub usage_page: u16,
    pub usage: u16,
}

impl HidDeviceInfo {
    pub fn friendly_name(&self) -> String {
        match (&self.manufacturer, &self.product) {
            (Some(m), Some(p)) => format!("{m} {p}"),
            (None, Some(p)) => p.clone(),
            _ => "Unnamed Device".to_string(),
        }
    }
}

/// System HID enumeration and access.
pub trait HidBackend: Send + Sync {
    /// All currently connected HID interfaces.
    fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, HidError>;

    /// Check that the device can be opened for reading.
    fn can_open(&self, device: &HidDeviceInfo) -> Result<(), HidError>;

    /// Maximum input/output report lengths of the device.
    fn report_lengths(&self, device: &HidDeviceInfo) -> Result<ReportLengths, HidError>;

    fn open(&self, device: &HidDeviceInfo) -> Result<Box<dyn HidStream>, HidError>;
}

/// An opened device stream.
pub trait HidStream: Send {
    /// Block for up to `timeout` waiting for one input report.
    ///
    /// Returns `Ok(0)` when nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, HidError>;

    fn set_feature(&mut self, report: &[u8]) -> Result<(), HidError>;

    fn write(&mut self, report: &[u8]) -> Result<(), HidError>;

    /// Query an indexed USB string descriptor.
    fn device_string(&mut self, index: u8) -> Result<String, HidError>;
}

// -- hidapi implementation ------------------------------------

fn map_hidapi_error(path: &str, err: hidapi::HidError) -> HidError {
    match err {
        hidapi::HidError::IoError { error } => match error.kind() {
            ErrorKind::PermissionDenied => HidError::PermissionDenied {
                path: path.to_string(),
            },
            ErrorKind::NotFound => HidError::NotFound(path.to_string()),
            _ if error.raw_os_error() == Some(16) => HidError::Busy {
                path: path.to_string(),
            },
            _ => HidError::Io(error.to_string()),
        },
        other => {
            let message = other.to_string();
            let lower = message.to_lowercase();
            if lower.contains("permission denied") || lower.contains("access denied") {
                HidError::PermissionDenied {
                    path: path.to_string(),
                }
            } else if lower.contains("busy") {
                HidError::Busy {
                    path: path.to_string(),
                }
            } else {
                HidError::Backend(message)
            }
        }
    }
}

fn info_from(info: &hidapi::DeviceInfo) -> HidDeviceInfo {
    let interface = info.interface_number();
    HidDeviceInfo {
        path: info.path().to_string_lossy().into_owned(),
        vendor_id: info.vendor_id(),
        product_id: info.product_id(),
        product: info.product_string().map(str::to_string),
        manufacturer: info.manufacturer_string().map(str::to_string),
        serial_number: info.serial_number().map(str::to_string),
        interface_number: (interface >= 0).then_some(interface),
        usage_page: info.usage_page(),
        usage: info.usage(),
    }
}

/// `hidapi`-backed device access.
pub struct HidApiBackend {
    api: Arc<Mutex<hidapi::HidApi>>,
}

impl HidApiBackend {
    pub fn new() -> Result<Self, HidError> {
        let api = hidapi::HidApi::new().map_err(|e| HidError::Backend(e.to_string()))?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
        })
    }

    fn open_raw(&self, device: &HidDeviceInfo) -> Result<hidapi::HidDevice, HidError> {
        let path = CString::new(device.path.as_bytes())
            .map_err(|_| HidError::NotFound(device.path.clone()))?;
        self.api
            .lock()
            .open_path(&path)
            .map_err(|e| map_hidapi_error(&device.path, e))
    }
}

impl HidBackend for HidApiBackend {
    fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, HidError> {
        let mut api = self.api.lock();
        api.refresh_devices()
            .map_err(|e| HidError::Backend(e.to_string()))?;
        Ok(api.device_list().map(info_from).collect())
    }

    fn can_open(&self, device: &HidDeviceInfo) -> Result<(), HidError> {
        self.open_raw(device).map(drop)
    }

    fn report_lengths(&self, device: &HidDeviceInfo) -> Result<ReportLengths, HidError> {
        let handle = self.open_raw(device)?;
        let mut buf = [0u8; hidapi::MAX_REPORT_DESCRIPTOR_SIZE];
        let len = handle
            .get_report_descriptor(&mut buf)
            .map_err(|e| map_hidapi_error(&device.path, e))?;
        Ok(report_lengths(&buf[..len]))
    }

    fn open(&self, device: &HidDeviceInfo) -> Result<Box<dyn HidStream>, HidError> {
        let handle = self.open_raw(device)?;
        handle
            .set_blocking_mode(true)
            .map_err(|e| map_hidapi_error(&device.path, e))?;
        Ok(Box::new(HidApiStream {
            handle,
            path: device.path.clone(),
            api: Arc::clone(&self.api),
        }))
    }
}

struct HidApiStream {
    handle: hidapi::HidDevice,
    path: String,
    api: Arc<Mutex<hidapi::HidApi>>,
}

impl HidApiStream {
    /// hidapi reports removal as a generic read error; re-enumerate to tell a
    /// vanished device from a transient failure.
    fn classify_read_error(&self, err: hidapi::HidError) -> HidError {
        let mut api = self.api.lock();
        let present = api.refresh_devices().is_ok()
            && api
                .device_list()
                .any(|info| info.path().to_string_lossy() == self.path);
        if present {
            map_hidapi_error(&self.path, err)
        } else {
            debug!("{} no longer enumerates: {err}", self.path);
            HidError::Disconnected
        }
    }
}

impl HidStream for HidApiStream {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, HidError> {
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        self.handle
            .read_timeout(buf, millis)
            .map_err(|e| self.classify_read_error(e))
    }

    fn set_feature(&mut self, report: &[u8]) -> Result<(), HidError> {
        self.handle
            .send_feature_report(report)
            .map_err(|e| map_hidapi_error(&self.path, e))
    }

    fn write(&mut self, report: &[u8]) -> Result<(), HidError> {
        self.handle
            .write(report)
            .map(drop)
            .map_err(|e| map_hidapi_error(&self.path, e))
    }

    fn device_string(&mut self, index: u8) -> Result<String, HidError> {
        self.handle
            .get_indexed_string(index as i32)
            .map(Option::unwrap_or_default)
            .map_err(|e| map_hidapi_error(&self.path, e))
    }
}
