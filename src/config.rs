//! Settings file and tablet catalog parsing.
//!
//! Both use TOML. The settings file configures the daemon:
//!
//! ```toml
//! [global]
//! log_level = "info"
//! catalog_dir = "/etc/stylusd/tablets"
//!
//! [output]
//! mode = "absolute"
//!
//! [absolute]
//! display = { width = 1920, height = 1080, x = 960, y = 540 }
//! tablet = { width = 152.0, height = 95.0, x = 76.0, y = 47.5, rotation = 0 }
//! clipping = true
//! limiting = false
//!
//! [relative]
//! x_sensitivity = 10.0
//! y_sensitivity = 10.0
//! reset_time_ms = 100
//!
//! [[filters]]
//! name = "offset"
//! x = 4.0
//!
//! [bindings]
//! tip = "left"
//! pen_buttons = ["right", "middle"]
//! ```
//!
//! Each file in the catalog directory describes one tablet:
//!
//! ```toml
//! name = "Wacom CTL-470"
//!
//! [specifications]
//! width = 147.2
//! height = 92.0
//! max_x = 14720
//! max_y = 9200
//! max_pressure = 1023
//!
//! [[digitizer]]
//! vendor_id = 0x056A
//! product_id = 0x00DD
//! input_report_length = 10
//! report_parser = "intuos_v2"
//! device_strings = { "2" = "^CTL" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::binding::BindingSettings;
use crate::codec::ReportParser;
use crate::filter::{FilterError, FilterParams};
use crate::geometry::{Area, Point};
use crate::hid::HidError;
use crate::output::OutputModeKind;
use crate::pointer::{MouseButton, PointerError};
use crate::tablet::{
    DeviceIdentifier, DeviceStringPattern, TabletConfiguration, TabletSpecifications,
};

pub const DEFAULT_CATALOG_DIR: &str = "/etc/stylusd/tablets";

/// Top-level error type used throughout the crate.
#[derive(Debug, Error)]
pub enum StylusdError {
    #[error("Failed to read config file {path}: {source}")]
    ConfigReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    #[error("Invalid tablet configuration {path}: {message}")]
    InvalidTablet { path: PathBuf, message: String },

    #[error("Invalid settings: {message}")]
    InvalidSettings { message: String },

    #[error(transparent)]
    Hid(#[from] HidError),

    #[error(transparent)]
    Pointer(#[from] PointerError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StylusdError> {
    let content = fs::read_to_string(path).map_err(|e| StylusdError::ConfigReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| StylusdError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

// -- Settings -------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    global: RawGlobal,
    output: RawOutput,
    absolute: RawAbsolute,
    relative: RawRelative,
    filters: Vec<RawFilter>,
    bindings: RawBindings,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawGlobal {
    log_level: Option<String>,
    log_file: Option<String>,
    catalog_dir: Option<PathBuf>,
    hotplug_interval_ms: Option<u64>,
    enable_input: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawOutput {
    mode: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
#[serde(default)]
struct RawArea {
    width: Option<f64>,
    height: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawAbsolute {
    display: Option<RawArea>,
    tablet: Option<RawArea>,
    clipping: Option<bool>,
    limiting: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRelative {
    x_sensitivity: Option<f64>,
    y_sensitivity: Option<f64>,
    rotation: Option<f64>,
    reset_time_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawFilter {
    name: String,
    #[serde(flatten)]
    params: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawBindings {
    tip: Option<String>,
    tip_activation_pressure: Option<f64>,
    pen_buttons: Option<Vec<String>>,
    aux_buttons: Option<Vec<String>>,
}

/// Absolute mode areas. Positions are area centers.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteSettings {
    /// Display area in pixels.
    pub display: Area,
    /// Tablet area in millimeters; `None` maps the whole tablet.
    pub tablet: Option<Area>,
    pub clipping: bool,
    pub limiting: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelativeSettings {
    pub sensitivity: Point,
    pub rotation: f64,
    pub reset_time: Duration,
}

/// One `[[filters]]` entry, constructed through the filter registry.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    pub name: String,
    pub params: FilterParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub mode: OutputModeKind,
    pub absolute: AbsoluteSettings,
    pub relative: RelativeSettings,
    pub filters: Vec<FilterSettings>,
}

/// Top-level parsed settings.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub log_level: String,
    pub log_file: Option<String>,
    pub catalog_dir: PathBuf,
    pub hotplug_interval: Duration,
    pub enable_input: bool,
    pub output: OutputSettings,
    pub bindings: BindingSettings,
}

fn invalid(message: impl Into<String>) -> StylusdError {
    StylusdError::InvalidSettings {
        message: message.into(),
    }
}

fn parse_button(field: &str, value: &str) -> Result<Option<MouseButton>, StylusdError> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    MouseButton::from_str(value)
        .map(Some)
        .map_err(|_| invalid(format!("{field}: unknown mouse button '{value}'")))
}

fn parse_buttons(field: &str, values: &[String]) -> Result<Vec<Option<MouseButton>>, StylusdError> {
    values.iter().map(|v| parse_button(field, v)).collect()
}

impl RawBindings {
    fn into_settings(self) -> Result<BindingSettings, StylusdError> {
        let defaults = BindingSettings::default();
        let tip_activation_pressure = self
            .tip_activation_pressure
            .unwrap_or(defaults.tip_activation_pressure);
        if !(0.0..=100.0).contains(&tip_activation_pressure) {
            return Err(invalid(format!(
                "bindings.tip_activation_pressure must be within 0..=100, got {tip_activation_pressure}"
            )));
        }

        Ok(BindingSettings {
            tip: match self.tip.as_deref() {
                Some(value) => parse_button("bindings.tip", value)?,
                None => defaults.tip,
            },
            tip_activation_pressure,
            pen_buttons: match self.pen_buttons {
                Some(values) => parse_buttons("bindings.pen_buttons", &values)?,
                None => defaults.pen_buttons,
            },
            aux_buttons: match self.aux_buttons {
                Some(values) => parse_buttons("bindings.aux_buttons", &values)?,
                None => defaults.aux_buttons,
            },
        })
    }
}

fn finite(field: &str, value: f64) -> Result<f64, StylusdError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(format!("{field} must be a finite number, got {value}")))
    }
}

/// Validate a size and center; `x`/`y` default to the area's own center.
fn area(section: &str, width: f64, height: f64, raw: &RawArea) -> Result<Area, StylusdError> {
    let width = finite(&format!("{section}.width"), width)?;
    let height = finite(&format!("{section}.height"), height)?;
    if width <= 0.0 || height <= 0.0 {
        return Err(invalid(format!(
            "{section} must have a positive size, got {width}x{height}"
        )));
    }
    let x = finite(&format!("{section}.x"), raw.x.unwrap_or(width / 2.0))?;
    let y = finite(&format!("{section}.y"), raw.y.unwrap_or(height / 2.0))?;
    let rotation = finite(&format!("{section}.rotation"), raw.rotation.unwrap_or(0.0))?;
    Ok(Area::new(width, height, Point::new(x, y), rotation))
}

fn display_area(raw: Option<RawArea>) -> Result<Area, StylusdError> {
    let raw = raw.unwrap_or_default();
    let mut display = area(
        "absolute.display",
        raw.width.unwrap_or(1920.0),
        raw.height.unwrap_or(1080.0),
        &raw,
    )?;
    display.rotation = 0.0;
    Ok(display)
}

fn tablet_area(raw: Option<RawArea>) -> Result<Option<Area>, StylusdError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let (Some(width), Some(height)) = (raw.width, raw.height) else {
        return Err(invalid("absolute.tablet requires width and height"));
    };
    area("absolute.tablet", width, height, &raw).map(Some)
}

fn filter_settings(raw: RawFilter) -> Result<FilterSettings, StylusdError> {
    for (key, value) in &raw.params {
        finite(&format!("filters.{}.{key}", raw.name), *value)?;
    }
    Ok(FilterSettings {
        name: raw.name,
        params: raw.params,
    })
}

/// Parse a TOML settings file into validated `AppSettings`.
pub fn parse_settings_file(path: &Path) -> Result<AppSettings, StylusdError> {
    let raw: RawSettings = read_toml(path)?;

    let mode = match raw.output.mode.as_deref() {
        Some(mode) => OutputModeKind::from_str(mode)
            .map_err(|_| invalid(format!("output.mode: unknown mode '{mode}'")))?,
        None => OutputModeKind::default(),
    };

    let relative = RelativeSettings {
        sensitivity: Point::new(
            finite("relative.x_sensitivity", raw.relative.x_sensitivity.unwrap_or(10.0))?,
            finite("relative.y_sensitivity", raw.relative.y_sensitivity.unwrap_or(10.0))?,
        ),
        rotation: finite("relative.rotation", raw.relative.rotation.unwrap_or(0.0))?,
        reset_time: Duration::from_millis(raw.relative.reset_time_ms.unwrap_or(100)),
    };

    let settings = AppSettings {
        log_level: raw.global.log_level.unwrap_or_else(|| "info".to_string()),
        log_file: raw.global.log_file,
        catalog_dir: raw
            .global
            .catalog_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_DIR)),
        hotplug_interval: Duration::from_millis(raw.global.hotplug_interval_ms.unwrap_or(1000).max(1)),
        enable_input: raw.global.enable_input.unwrap_or(true),
        output: OutputSettings {
            mode,
            absolute: AbsoluteSettings {
                display: display_area(raw.absolute.display)?,
                tablet: tablet_area(raw.absolute.tablet)?,
                clipping: raw.absolute.clipping.unwrap_or(true),
                limiting: raw.absolute.limiting.unwrap_or(false),
            },
            relative,
            filters: raw
                .filters
                .into_iter()
                .map(filter_settings)
                .collect::<Result<_, _>>()?,
        },
        bindings: raw.bindings.into_settings()?,
    };

    debug!(
        "Settings: mode={}, {} filter(s), catalog {}",
        settings.output.mode,
        settings.output.filters.len(),
        settings.catalog_dir.display()
    );
    Ok(settings)
}

// -- Tablet catalog -------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawTablet {
    name: Option<String>,
    specifications: RawSpecifications,
    digitizer: Vec<RawIdentifier>,
    auxiliary: Vec<RawIdentifier>,
    attributes: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawSpecifications {
    width: Option<f64>,
    height: Option<f64>,
    max_x: Option<f64>,
    max_y: Option<f64>,
    max_pressure: Option<u32>,
    minimum_range: Option<u32>,
    pen_buttons: Option<u8>,
    aux_buttons: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawIdentifier {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    input_report_length: Option<usize>,
    output_report_length: Option<usize>,
    report_parser: Option<String>,
    device_strings: BTreeMap<String, String>,
    init_strings: Vec<u8>,
    feature_init_report: Option<Vec<u8>>,
    output_init_report: Option<Vec<u8>>,
}

impl RawSpecifications {
    fn into_specifications(self) -> Result<TabletSpecifications, String> {
        let defaults = TabletSpecifications::default();
        let specs = TabletSpecifications {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            max_x: self.max_x.unwrap_or(defaults.max_x),
            max_y: self.max_y.unwrap_or(defaults.max_y),
            max_pressure: self.max_pressure.unwrap_or(defaults.max_pressure),
            minimum_range: self.minimum_range.unwrap_or(defaults.minimum_range),
            pen_buttons: self.pen_buttons.unwrap_or(defaults.pen_buttons),
            aux_buttons: self.aux_buttons.unwrap_or(defaults.aux_buttons),
        };
        if ![specs.width, specs.height, specs.max_x, specs.max_y]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err("specifications must be finite numbers".to_string());
        }
        if specs.max_x <= 0.0 || specs.max_y <= 0.0 {
            return Err(format!(
                "specifications max_x/max_y must be positive, got {}x{}",
                specs.max_x, specs.max_y
            ));
        }
        if specs.width < 0.0 || specs.height < 0.0 {
            return Err("specifications width/height must not be negative".to_string());
        }
        Ok(specs)
    }
}

impl RawIdentifier {
    fn into_identifier(self, section: &str, default_parser: ReportParser) -> Result<DeviceIdentifier, String> {
        let (Some(vendor_id), Some(product_id)) = (self.vendor_id, self.product_id) else {
            return Err(format!("[[{section}]] requires vendor_id and product_id"));
        };

        let report_parser = match self.report_parser.as_deref() {
            Some(name) => ReportParser::from_str(name)
                .map_err(|_| format!("[[{section}]] unknown report parser '{name}'"))?,
            None => default_parser,
        };

        let device_strings = self
            .device_strings
            .into_iter()
            .map(|(index, pattern)| {
                let index = index
                    .parse::<u8>()
                    .map_err(|_| format!("[[{section}]] device string index '{index}' is not a byte"))?;
                let pattern = Regex::new(&pattern)
                    .map_err(|e| format!("[[{section}]] device string {index}: {e}"))?;
                Ok(DeviceStringPattern { index, pattern })
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(DeviceIdentifier {
            vendor_id,
            product_id,
            input_report_length: self.input_report_length,
            output_report_length: self.output_report_length,
            report_parser,
            device_strings,
            init_strings: self.init_strings,
            feature_init_report: self.feature_init_report,
            output_init_report: self.output_init_report,
        })
    }
}

/// Parse one tablet configuration file.
pub fn parse_tablet_file(path: &Path) -> Result<TabletConfiguration, StylusdError> {
    let raw: RawTablet = read_toml(path)?;
    let reject = |message: String| StylusdError::InvalidTablet {
        path: path.to_path_buf(),
        message,
    };

    let name = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| reject("missing tablet name".to_string()))?;

    let digitizer_identifiers = raw
        .digitizer
        .into_iter()
        .map(|r| r.into_identifier("digitizer", ReportParser::Tablet))
        .collect::<Result<Vec<_>, _>>()
        .map_err(reject)?;
    let auxiliary_identifiers = raw
        .auxiliary
        .into_iter()
        .map(|r| r.into_identifier("auxiliary", ReportParser::Aux))
        .collect::<Result<Vec<_>, _>>()
        .map_err(reject)?;

    Ok(TabletConfiguration {
        name,
        specifications: raw.specifications.into_specifications().map_err(reject)?,
        digitizer_identifiers,
        auxiliary_identifiers,
        attributes: raw.attributes,
    })
}

fn collect_toml_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), StylusdError> {
    let entries = fs::read_dir(dir).map_err(|e| StylusdError::ConfigReadError {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|e| StylusdError::ConfigReadError {
                path: dir.to_path_buf(),
                source: e,
            })?
            .path();
        if path.is_dir() {
            collect_toml_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    Ok(())
}

/// Load every `*.toml` under `dir`, recursively, ordered by path.
///
/// Path order is catalog order, which is detection priority. Any invalid file
/// fails the whole load.
pub fn parse_catalog_dir(dir: &Path) -> Result<Vec<Arc<TabletConfiguration>>, StylusdError> {
    let mut files = Vec::new();
    collect_toml_files(dir, &mut files)?;
    files.sort();

    if files.is_empty() {
        warn!("No tablet configurations found in {}", dir.display());
    }

    files
        .iter()
        .map(|path| {
            let configuration = parse_tablet_file(path)?;
            debug!("Loaded tablet '{}' from {}", configuration.name, path.display());
            Ok(Arc::new(configuration))
        })
        .collect()
}
