//! Matching catalog identifiers against connected HID devices.
//!
//! [`find_candidates`] filters the system enumeration; [`open_first`] applies the
//! tie-break policy by initializing candidates in order until one succeeds.
use std::collections::BTreeMap;

use log::{debug, error, warn};
use strum::Display;

use crate::hid::{HidBackend, HidDeviceInfo, HidError, HidStream};
use crate::tablet::DeviceIdentifier;

/// Which interface of a tablet is being matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeviceRole {
    #[strum(serialize = "digitizer")]
    Digitizer,
    #[strum(serialize = "auxiliary device")]
    Auxiliary,
}

/// Operating system family, for attribute selectors that only apply on one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }
}

/// A device that has been opened and initialized.
pub struct MatchedDevice {
    pub info: HidDeviceInfo,
    pub stream: Box<dyn HidStream>,
}

/// Log an open/query failure at the level its kind deserves.
pub(crate) fn log_device_error(device: &HidDeviceInfo, err: &HidError) {
    if let Some(hint) = err.hint() {
        error!("Cannot access '{}': {err}. {hint}", device.path);
    } else {
        debug!("Skipping '{}': {err}", device.path);
    }
}

/// Windows composite devices expose each interface/collection as its own
/// path (`...&mi_01&col02...`); the catalog pins them with `WinInterface` and
/// `WinUsage`. Other platforms pass unconditionally.
pub fn matches_platform_attributes(
    device: &HidDeviceInfo,
    attributes: &BTreeMap<String, String>,
    role: DeviceRole,
    platform: Platform,
) -> bool {
    if platform != Platform::Windows || role != DeviceRole::Digitizer {
        return true;
    }

    let path = device.path.to_lowercase();
    let selector = |key: &str, prefix: &str| {
        attributes.get(key).is_none_or(|value| {
            path.contains(&format!("{prefix}{}", value.to_lowercase()))
        })
    };
    selector("WinInterface", "&mi_") && selector("WinUsage", "&col")
}

/// Query every device string the identifier constrains; all must match.
fn matches_device_strings(
    backend: &dyn HidBackend,
    device: &HidDeviceInfo,
    identifier: &DeviceIdentifier,
) -> bool {
    if identifier.device_strings.is_empty() {
        return true;
    }

    let mut stream = match backend.open(device) {
        Ok(stream) => stream,
        Err(e) => {
            log_device_error(device, &e);
            return false;
        }
    };

    identifier.device_strings.iter().all(|query| {
        match stream.device_string(query.index) {
            Ok(value) => {
                let matched = query.pattern.is_match(&value);
                debug!(
                    "'{}' string {} = '{value}' {} /{}/",
                    device.path,
                    query.index,
                    if matched { "matches" } else { "does not match" },
                    query.pattern
                );
                matched
            }
            Err(e) => {
                debug!(
                    "Failed to read string {} from '{}': {e}",
                    query.index, device.path
                );
                false
            }
        }
    })
}

fn matches_report_lengths(
    backend: &dyn HidBackend,
    device: &HidDeviceInfo,
    identifier: &DeviceIdentifier,
) -> bool {
    if identifier.input_report_length.is_none() && identifier.output_report_length.is_none() {
        return true;
    }

    match backend.report_lengths(device) {
        Ok(lengths) => {
            identifier
                .input_report_length
                .is_none_or(|len| lengths.input == Some(len))
                && identifier
                    .output_report_length
                    .is_none_or(|len| lengths.output == Some(len))
        }
        Err(e) => {
            log_device_error(device, &e);
            false
        }
    }
}

/// All connected devices matching `identifier`, in enumeration order.
///
/// Devices that cannot be opened are excluded. An empty result is not an error.
pub fn find_candidates(
    backend: &dyn HidBackend,
    identifier: &DeviceIdentifier,
    attributes: &BTreeMap<String, String>,
    role: DeviceRole,
    platform: Platform,
) -> Vec<HidDeviceInfo> {
    let devices = match backend.enumerate() {
        Ok(devices) => devices,
        Err(e) => {
            warn!("HID enumeration failed: {e}");
            return Vec::new();
        }
    };

    devices
        .into_iter()
        .filter(|d| d.vendor_id == identifier.vendor_id && d.product_id == identifier.product_id)
        .filter(|d| match backend.can_open(d) {
            Ok(()) => true,
            Err(e) => {
                log_device_error(d, &e);
                false
            }
        })
        .filter(|d| matches_report_lengths(backend, d, identifier))
        .filter(|d| matches_device_strings(backend, d, identifier))
        .filter(|d| matches_platform_attributes(d, attributes, role, platform))
        .collect()
}

/// Open a device and perform the identifier's one-time initialization.
///
/// Only the open itself can fail; init string queries and init report writes are
/// best-effort and logged as warnings.
pub fn initialize_device(
    backend: &dyn HidBackend,
    device: &HidDeviceInfo,
    identifier: &DeviceIdentifier,
) -> Result<Box<dyn HidStream>, HidError> {
    let mut stream = backend.open(device)?;

    debug!("Using device '{}'", device.friendly_name());
    debug!("Using report parser '{}'", identifier.report_parser);
    debug!("Device path: {}", device.path);

    for &index in &identifier.init_strings {
        debug!("Initializing string index {index}");
        if let Err(e) = stream.device_string(index) {
            warn!("Failed to query initialization string {index}: {e}");
        }
    }

    if let Some(report) = identifier.feature_init_report.as_deref().filter(|r| !r.is_empty()) {
        match stream.set_feature(report) {
            Ok(()) => debug!("Set feature: {report:02X?}"),
            Err(e) => warn!("Failed to set feature {report:02X?}: {e}"),
        }
    }

    if let Some(report) = identifier.output_init_report.as_deref().filter(|r| !r.is_empty()) {
        match stream.write(report) {
            Ok(()) => debug!("Set output: {report:02X?}"),
            Err(e) => warn!("Failed to set output {report:02X?}: {e}"),
        }
    }

    Ok(stream)
}

/// Initialize candidates in order until one succeeds.
pub fn open_first(
    backend: &dyn HidBackend,
    identifier: &DeviceIdentifier,
    candidates: Vec<HidDeviceInfo>,
    role: DeviceRole,
) -> Option<MatchedDevice> {
    if candidates.len() > 1 {
        warn!("More than 1 matching {role} has been found.");
    }

    for info in candidates {
        match initialize_device(backend, &info, identifier) {
            Ok(stream) => return Some(MatchedDevice { info, stream }),
            Err(e) => {
                if e.is_access_error() {
                    log_device_error(&info, &e);
                } else {
                    warn!("Failed to initialize '{}': {e}", info.path);
                }
            }
        }
    }
    None
}

/// Try each identifier in catalog order; return the first that yields an
/// initialized device.
pub fn match_identifiers(
    backend: &dyn HidBackend,
    identifiers: &[DeviceIdentifier],
    attributes: &BTreeMap<String, String>,
    role: DeviceRole,
    platform: Platform,
) -> Option<(DeviceIdentifier, MatchedDevice)> {
    identifiers.iter().find_map(|identifier| {
        let candidates = find_candidates(backend, identifier, attributes, role, platform);
        open_first(backend, identifier, candidates, role)
            .map(|device| (identifier.clone(), device))
    })
}
