//! Output modes: turn pen reports into pointer commands.
//!
//! A report flows through [`OutputPipeline::handle`]: the proximity gate first,
//! then the active [`OutputMode`], then pen/aux bindings. Everything here runs
//! inline on the reader thread, once per hardware report.
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use strum::{Display, EnumString, IntoStaticStr};

use crate::binding::BindingHandler;
use crate::filter::{Filter, apply_filters};
use crate::geometry::{Area, Point};
use crate::pointer::Pointer;
use crate::report::{DeviceReport, TabletReport};
use crate::tablet::{TabletSpecifications, TabletState};

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OutputModeKind {
    #[default]
    Absolute,
    Relative,
}

/// What an output mode sent to the pointer for one report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerCommand {
    Absolute(Point),
    Relative(Point),
}

/// Shared contact gate: at or below the minimum range the pen is hovering,
/// not touching, and must not move the pointer.
pub fn is_touching(report: &TabletReport, specs: &TabletSpecifications) -> bool {
    report.lift > specs.minimum_range
}

pub trait OutputMode: Send {
    fn kind(&self) -> OutputModeKind;

    /// Map one touching report to a pointer command and send it.
    fn read(
        &mut self,
        report: &TabletReport,
        tablet: &TabletState,
        pointer: &mut dyn Pointer,
    ) -> Option<PointerCommand>;
}

// -- Absolute -------------------------------------------------

/// Maps an area of the tablet onto an area of the display.
#[derive(Debug)]
pub struct AbsoluteMode {
    /// Tablet area in millimeters; `None` uses the whole active area.
    pub input: Option<Area>,
    /// Display area in pixels.
    pub output: Area,
    pub clipping: bool,
    pub limiting: bool,
    pub filters: Vec<Box<dyn Filter>>,
}

impl AbsoluteMode {
    pub fn new(output: Area) -> Self {
        Self {
            input: None,
            output,
            clipping: true,
            limiting: false,
            filters: Vec::new(),
        }
    }

    /// Display position for a raw report, or `None` when limiting drops it.
    ///
    /// Computed from the raw report and the areas alone, so no error carries
    /// over between reports.
    pub fn transform(&self, report: &TabletReport, specs: &TabletSpecifications) -> Option<Point> {
        let input = self
            .input
            .unwrap_or_else(|| Area::full(specs.width, specs.height));
        if input.width <= 0.0 || input.height <= 0.0 || specs.max_x <= 0.0 || specs.max_y <= 0.0 {
            return None;
        }

        let raw = Point::new(f64::from(report.x), f64::from(report.y));
        let millimeters = (raw / Point::new(specs.max_x, specs.max_y))
            .scale(Point::new(specs.width, specs.height));
        let relative = (millimeters - input.position).rotated(-input.rotation);

        if self.limiting && !input.contains_relative(relative) {
            return None;
        }

        let mut position = (relative / input.size()).scale(self.output.size()) + self.output.position;
        if self.clipping {
            position = self.output.clamp(position);
        }
        Some(apply_filters(&self.filters, position))
    }
}

impl OutputMode for AbsoluteMode {
    fn kind(&self) -> OutputModeKind {
        OutputModeKind::Absolute
    }

    fn read(
        &mut self,
        report: &TabletReport,
        tablet: &TabletState,
        pointer: &mut dyn Pointer,
    ) -> Option<PointerCommand> {
        let position = self.transform(report, tablet.specifications())?;
        if let Err(e) = pointer.set_absolute_position(position) {
            debug!("Pointer update failed: {e}");
        }
        Some(PointerCommand::Absolute(position))
    }
}

// -- Relative -------------------------------------------------

/// Moves the cursor by pen deltas, like a mouse.
pub struct RelativeMode {
    /// Pixels per millimeter, per axis.
    pub sensitivity: Point,
    /// Degrees.
    pub rotation: f64,
    /// A gap longer than this between reports starts a new stroke.
    pub reset_time: Duration,
    pub filters: Vec<Box<dyn Filter>>,
    clock: Arc<dyn Clock>,
    last_report: Option<TabletReport>,
    last_timestamp: Option<Instant>,
    last_position: Option<Point>,
}

impl RelativeMode {
    pub fn new(sensitivity: Point, rotation: f64, reset_time: Duration) -> Self {
        Self::with_clock(sensitivity, rotation, reset_time, Arc::new(MonotonicClock))
    }

    pub fn with_clock(
        sensitivity: Point,
        rotation: f64,
        reset_time: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sensitivity,
            rotation,
            reset_time,
            filters: Vec::new(),
            clock,
            last_report: None,
            last_timestamp: None,
            last_position: None,
        }
    }

    /// Delta in pixels between two raw reports.
    pub fn delta(&self, last: &TabletReport, current: &TabletReport, specs: &TabletSpecifications) -> Point {
        let raw = Point::new(
            f64::from(current.x) - f64::from(last.x),
            f64::from(current.y) - f64::from(last.y),
        );
        (raw / Point::new(specs.max_x, specs.max_y))
            .scale(Point::new(specs.width, specs.height))
            .rotated(self.rotation)
            .scale(self.sensitivity)
    }
}

impl OutputMode for RelativeMode {
    fn kind(&self) -> OutputModeKind {
        OutputModeKind::Relative
    }

    fn read(
        &mut self,
        report: &TabletReport,
        tablet: &TabletState,
        pointer: &mut dyn Pointer,
    ) -> Option<PointerCommand> {
        let now = self.clock.now();
        if self
            .last_timestamp
            .is_some_and(|last| now.saturating_duration_since(last) > self.reset_time)
        {
            self.last_report = None;
            self.last_position = None;
        }

        let command = self.last_report.map(|last| {
            let delta = self.delta(&last, report, tablet.specifications());
            let base = self
                .last_position
                .or_else(|| pointer.current_position())
                .unwrap_or(Point::ORIGIN);
            let target = apply_filters(&self.filters, base + delta);
            let motion = target - base;
            if let Err(e) = pointer.move_relative(motion) {
                debug!("Pointer update failed: {e}");
            }
            self.last_position = Some(target);
            PointerCommand::Relative(motion)
        });

        self.last_report = Some(*report);
        self.last_timestamp = Some(now);
        command
    }
}

// -- Pipeline -------------------------------------------------

/// The output side of the driver: mode, bindings and the pointer they drive.
pub struct OutputPipeline {
    mode: Box<dyn OutputMode>,
    bindings: Option<BindingHandler>,
    pointer: Box<dyn Pointer>,
}

impl std::fmt::Debug for OutputPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPipeline").finish_non_exhaustive()
    }
}

impl OutputPipeline {
    pub fn new(mode: Box<dyn OutputMode>, pointer: Box<dyn Pointer>) -> Self {
        Self {
            mode,
            bindings: None,
            pointer,
        }
    }

    pub fn with_bindings(mut self, bindings: BindingHandler) -> Self {
        self.bindings = Some(bindings);
        self
    }

    pub fn kind(&self) -> OutputModeKind {
        self.mode.kind()
    }

    /// Process one decoded report. Returns the motion sent to the pointer, if any.
    pub fn handle(&mut self, report: &DeviceReport, tablet: &TabletState) -> Option<PointerCommand> {
        match report {
            DeviceReport::Tablet(pen) => {
                let command = if is_touching(pen, tablet.specifications()) {
                    self.mode.read(pen, tablet, self.pointer.as_mut())
                } else {
                    None
                };
                if let Some(bindings) = self.bindings.as_mut() {
                    bindings.handle_tablet(pen, tablet.specifications(), self.pointer.as_mut());
                }
                command
            }
            DeviceReport::Aux(aux) => {
                if let Some(bindings) = self.bindings.as_mut() {
                    bindings.handle_aux(aux, self.pointer.as_mut());
                }
                None
            }
            _ => None,
        }
    }

    /// Release anything the bindings are holding down.
    pub fn release(&mut self) {
        if let Some(bindings) = self.bindings.as_mut() {
            bindings.release_all(self.pointer.as_mut());
        }
    }
}

impl Drop for OutputPipeline {
    fn drop(&mut self) {
        self.release();
    }
}
