//! Normalized device report model.
//!
//! Every vendor codec in [`crate::codec`] decodes into one of these values, so
//! nothing downstream ever looks at raw report bytes again.

/// Which end of the pen produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolType {
    #[default]
    Pen,
    Eraser,
}

/// Pen tilt in degrees from vertical, signed per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tilt {
    pub x: i16,
    pub y: i16,
}

/// A digitizer (pen) report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TabletReport {
    pub report_id: u8,
    /// Raw position in device units, `0..=max` per axis.
    pub x: u32,
    pub y: u32,
    pub pressure: u32,
    pub tilt: Option<Tilt>,
    /// Contact/proximity level compared against the tablet's minimum range.
    ///
    /// Status-byte codecs store the raw status byte here, flag-based codecs
    /// (Wacom) store the pressure.
    pub lift: u32,
    pub tool: ToolType,
    /// Pen is within sensing range.
    pub in_range: bool,
    pub hover_distance: Option<u32>,
    pub pen_buttons: Buttons,
}

/// Express key (and optional wheel) state from an auxiliary interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuxReport {
    pub report_id: u8,
    pub buttons: Buttons,
    pub wheel: Option<u8>,
}

/// One finger contact on a touch surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touch {
    pub slot: u8,
    pub x: u32,
    pub y: u32,
}

/// Multi-contact report. Only touching contacts are listed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TouchReport {
    pub report_id: u8,
    pub touches: Vec<Touch>,
}

/// Identity of the tool entering proximity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolReport {
    pub report_id: u8,
    pub serial: u64,
    pub tool_id: u32,
    pub tool: ToolType,
}

/// A decoded report, tagged by capability set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReport {
    Tablet(TabletReport),
    Aux(AuxReport),
    Touch(TouchReport),
    /// Tool-entering-proximity report (Wacom Intuos): identifies the pen end
    /// and serial before position reports start.
    Tool(ToolReport),
    /// A well-formed report the codec does not interpret (e.g. out-of-range or
    /// vendor status reports). Kept for debug views.
    Other { report_id: u8 },
}

impl DeviceReport {
    pub fn report_id(&self) -> u8 {
        match self {
            DeviceReport::Tablet(r) => r.report_id,
            DeviceReport::Aux(r) => r.report_id,
            DeviceReport::Touch(r) => r.report_id,
            DeviceReport::Tool(r) => r.report_id,
            DeviceReport::Other { report_id } => *report_id,
        }
    }
}

/// Up to 32 button states packed into a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons {
    bits: u32,
    count: u8,
}

impl Buttons {
    pub fn new(count: u8) -> Self {
        Self {
            bits: 0,
            count: count.min(32),
        }
    }

    /// Build from a raw bit field, keeping its `count` low bits.
    pub fn from_bits(bits: u32, count: u8) -> Self {
        let count = count.min(32);
        let mask = if count == 32 {
            u32::MAX
        } else {
            (1u32 << count) - 1
        };
        Self {
            bits: bits & mask,
            count,
        }
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> bool {
        index < self.len() && self.bits & (1 << index) != 0
    }

    pub fn set(&mut self, index: usize, pressed: bool) {
        if index >= self.len() {
            return;
        }
        if pressed {
            self.bits |= 1 << index;
        } else {
            self.bits &= !(1 << index);
        }
    }

    pub fn any(&self) -> bool {
        self.bits != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }
}
