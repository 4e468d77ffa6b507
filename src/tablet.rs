//! Tablet catalog records and the runtime match result.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::codec::ReportParser;

/// A device string that must match for an identifier to apply.
#[derive(Debug, Clone)]
pub struct DeviceStringPattern {
    pub index: u8,
    pub pattern: Regex,
}

/// How to recognize and talk to one HID interface of a tablet.
#[derive(Debug, Clone)]
pub struct DeviceIdentifier {
    pub vendor_id: u16,
    pub product_id: u16,
    /// `None` means any length is accepted.
    pub input_report_length: Option<usize>,
    pub output_report_length: Option<usize>,
    pub report_parser: ReportParser,
    /// All patterns must match (logical AND), checked in index order.
    pub device_strings: Vec<DeviceStringPattern>,
    /// String indices queried once on open; some tablets only switch to their
    /// native report mode after these reads.
    pub init_strings: Vec<u8>,
    pub feature_init_report: Option<Vec<u8>>,
    pub output_init_report: Option<Vec<u8>>,
}

impl DeviceIdentifier {
    /// Identifier matching any device with the given IDs.
    pub fn new(vendor_id: u16, product_id: u16, report_parser: ReportParser) -> Self {
        Self {
            vendor_id,
            product_id,
            input_report_length: None,
            output_report_length: None,
            report_parser,
            device_strings: Vec::new(),
            init_strings: Vec::new(),
            feature_init_report: None,
            output_init_report: None,
        }
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} ({})",
            self.vendor_id, self.product_id, self.report_parser
        )
    }
}

/// Physical and logical dimensions of the digitizer.
#[derive(Debug, Clone, PartialEq)]
pub struct TabletSpecifications {
    /// Active area in millimeters.
    pub width: f64,
    pub height: f64,
    /// Maximum raw coordinate per axis.
    pub max_x: f64,
    pub max_y: f64,
    pub max_pressure: u32,
    /// Reports whose lift is at or below this are not touching.
    pub minimum_range: u32,
    pub pen_buttons: u8,
    pub aux_buttons: u8,
}

impl Default for TabletSpecifications {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            max_x: 1.0,
            max_y: 1.0,
            max_pressure: 0,
            minimum_range: 0,
            pen_buttons: 2,
            aux_buttons: 0,
        }
    }
}

/// One catalog entry. Immutable after load.
#[derive(Debug, Clone)]
pub struct TabletConfiguration {
    pub name: String,
    pub specifications: TabletSpecifications,
    /// Tried in order; the first identifier with an initializable device wins.
    pub digitizer_identifiers: Vec<DeviceIdentifier>,
    pub auxiliary_identifiers: Vec<DeviceIdentifier>,
    /// Platform-specific hints, e.g. `WinInterface` / `WinUsage`.
    pub attributes: BTreeMap<String, String>,
}

/// Result of a successful match. Replaced as a whole, never mutated.
#[derive(Debug, Clone)]
pub struct TabletState {
    pub configuration: Arc<TabletConfiguration>,
    /// `None` when the configuration declares no digitizer.
    pub digitizer: Option<DeviceIdentifier>,
    pub auxiliary: Option<DeviceIdentifier>,
}

impl TabletState {
    pub fn name(&self) -> &str {
        &self.configuration.name
    }

    pub fn specifications(&self) -> &TabletSpecifications {
        &self.configuration.specifications
    }
}
