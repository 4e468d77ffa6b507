//! Vendor report codecs.
//!
//! Each [`ReportParser`] variant is a pure, stateless mapping from one raw HID
//! input report (report ID byte included) to a [`DeviceReport`]. The variant is
//! resolved once, when a tablet configuration is loaded, so the read loop never
//! dispatches on strings.
//!
//! Multi-byte fields are little-endian unless noted otherwise.
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::report::{
    AuxReport, Buttons, DeviceReport, TabletReport, Tilt, ToolReport, ToolType, Touch, TouchReport,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{parser} report too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        parser: ReportParser,
        expected: usize,
        actual: usize,
    },
}

/// Registry of known report codecs.
///
/// Catalog files may name a codec by its short name (`"uclogic"`) or by the
/// fully-qualified parser name used by existing tablet configuration catalogs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ReportParser {
    /// Passes reports through undecoded.
    #[strum(
        to_string = "device",
        serialize = "OpenTabletDriver.Tablet.DeviceReportParser"
    )]
    Device,
    #[strum(
        to_string = "tablet",
        serialize = "OpenTabletDriver.Tablet.TabletReportParser"
    )]
    Tablet,
    #[strum(
        to_string = "tilt_tablet",
        serialize = "OpenTabletDriver.Tablet.TiltTabletReportParser"
    )]
    TiltTablet,
    #[strum(
        to_string = "aux",
        serialize = "OpenTabletDriver.Tablet.AuxReportParser"
    )]
    Aux,
    #[strum(
        to_string = "skip_byte",
        serialize = "OpenTabletDriver.Vendors.SkipByteTabletReportParser"
    )]
    SkipByte,
    #[strum(
        to_string = "uclogic",
        serialize = "OpenTabletDriver.Vendors.UCLogic.UCLogicReportParser"
    )]
    UcLogic,
    #[strum(
        to_string = "giano",
        serialize = "OpenTabletDriver.Vendors.Huion.GianoReportParser"
    )]
    Giano,
    #[strum(
        to_string = "bamboo",
        serialize = "OpenTabletDriver.Vendors.Wacom.BambooReportParser"
    )]
    Bamboo,
    #[strum(to_string = "bamboo_touch")]
    BambooTouch,
    #[strum(
        to_string = "intuos_v2",
        serialize = "OpenTabletDriver.Vendors.Wacom.IntuosV2ReportParser"
    )]
    IntuosV2,
    #[strum(
        to_string = "intuos_v3",
        serialize = "OpenTabletDriver.Vendors.Wacom.IntuosV3ReportParser"
    )]
    IntuosV3,
    /// Wacom express keys on a dedicated 64-byte aux interface.
    #[strum(
        to_string = "wacom_64b_aux",
        serialize = "OpenTabletDriver.Vendors.Wacom.Wacom64bAuxReportParser"
    )]
    Wacom64bAux,
    /// Intuos V2 layout behind the vendor driver's extra leading byte.
    #[strum(
        to_string = "wacom_driver_intuos_v2",
        serialize = "OpenTabletDriver.Vendors.Wacom.WacomDriverIntuosV2ReportParser"
    )]
    WacomDriverIntuosV2,
    #[strum(
        to_string = "wacom_driver_intuos_v3",
        serialize = "OpenTabletDriver.Vendors.Wacom.WacomDriverIntuosV3ReportParser"
    )]
    WacomDriverIntuosV3,
    #[strum(
        to_string = "xp_pen",
        serialize = "OpenTabletDriver.Vendors.XP_Pen.XP_PenReportParser"
    )]
    XpPen,
    #[strum(
        to_string = "xp_pen_tilt",
        serialize = "OpenTabletDriver.Vendors.XP_Pen.XP_PenTiltReportParser"
    )]
    XpPenTilt,
}

/// UCLogic-family status byte values.
const STATUS_OUT_OF_RANGE: u8 = 0xC0;
const STATUS_UCLOGIC_AUX: u8 = 0xE0;
const STATUS_XP_PEN_AUX: u8 = 0xF0;

const INTUOS_V2_PAD_ID: u8 = 0x0C;
const INTUOS_V3_PEN_ID: u8 = 0x10;
const INTUOS_V3_AUX_ID: u8 = 0x11;
const BAMBOO_TOUCH_ID: u8 = 0x02;
const WACOM_64B_AUX_ID: u8 = 0x02;

impl ReportParser {
    /// Smallest buffer this codec can decode.
    pub fn min_length(self) -> usize {
        match self {
            ReportParser::Device => 1,
            ReportParser::Aux | ReportParser::Wacom64bAux => 2,
            ReportParser::Tablet | ReportParser::UcLogic | ReportParser::XpPen => 8,
            ReportParser::Bamboo => 8,
            ReportParser::SkipByte => 9,
            ReportParser::TiltTablet | ReportParser::XpPenTilt | ReportParser::IntuosV2 => 10,
            ReportParser::Giano => 12,
            ReportParser::WacomDriverIntuosV2 => 11,
            ReportParser::IntuosV3 => 17,
            ReportParser::WacomDriverIntuosV3 => 18,
            ReportParser::BambooTouch => 20,
        }
    }

    /// Decode one raw report. Never reads past `data`; short buffers fail whole.
    pub fn decode(self, data: &[u8]) -> Result<DeviceReport, DecodeError> {
        let expected = self.min_length();
        if data.len() < expected {
            return Err(DecodeError::TooShort {
                parser: self,
                expected,
                actual: data.len(),
            });
        }

        Ok(match self {
            ReportParser::Device => DeviceReport::Other {
                report_id: data[0],
            },
            ReportParser::Tablet => DeviceReport::Tablet(status_pen(data, false)),
            ReportParser::TiltTablet => DeviceReport::Tablet(status_pen(data, true)),
            ReportParser::Aux => DeviceReport::Aux(AuxReport {
                report_id: data[0],
                buttons: Buttons::from_bits(data[1] as u32, 8),
                wheel: None,
            }),
            ReportParser::SkipByte => DeviceReport::Tablet(status_pen(&data[1..], false)),
            ReportParser::UcLogic => decode_uclogic(data),
            ReportParser::Giano => decode_giano(data),
            ReportParser::Bamboo => DeviceReport::Tablet(decode_bamboo_pen(data)),
            ReportParser::BambooTouch => decode_bamboo_touch(data),
            ReportParser::IntuosV2 => decode_intuos_v2(data),
            ReportParser::IntuosV3 => decode_intuos_v3(data),
            ReportParser::Wacom64bAux => decode_wacom_64b_aux(data),
            ReportParser::WacomDriverIntuosV2 => decode_intuos_v2(&data[1..]),
            ReportParser::WacomDriverIntuosV3 => decode_intuos_v3(&data[1..]),
            ReportParser::XpPen => decode_xp_pen(data, false),
            ReportParser::XpPenTilt => decode_xp_pen(data, true),
        })
    }
}

// -- Byte helpers ---------------------------------------------

fn le16(data: &[u8], at: usize) -> u32 {
    u16::from_le_bytes([data[at], data[at + 1]]) as u32
}

fn be16(data: &[u8], at: usize) -> u32 {
    u16::from_be_bytes([data[at], data[at + 1]]) as u32
}

fn bit(byte: u8, index: u8) -> bool {
    byte & (1 << index) != 0
}

fn signed_tilt(data: &[u8], at: usize) -> Tilt {
    Tilt {
        x: data[at] as i8 as i16,
        y: data[at + 1] as i8 as i16,
    }
}

/// Two barrel buttons in bits 1 and 2 of a status byte.
fn barrel_buttons(status: u8) -> Buttons {
    Buttons::from_bits(((status >> 1) & 0b11) as u32, 2)
}

// -- Status-byte family (generic, UCLogic, XP-Pen) ------------

/// Decode the common status-byte pen layout:
/// `[id, status, x_lo, x_hi, y_lo, y_hi, p_lo, p_hi, (tilt_x, tilt_y)]`.
///
/// Status bit 5 is in-range, bits 1/2 barrel buttons, bit 3 eraser.
fn status_pen(data: &[u8], with_tilt: bool) -> TabletReport {
    let status = data[1];
    TabletReport {
        report_id: data[0],
        x: le16(data, 2),
        y: le16(data, 4),
        pressure: le16(data, 6),
        tilt: with_tilt.then(|| signed_tilt(data, 8)),
        lift: status as u32,
        tool: if bit(status, 3) {
            ToolType::Eraser
        } else {
            ToolType::Pen
        },
        in_range: bit(status, 5),
        hover_distance: None,
        pen_buttons: barrel_buttons(status),
    }
}

fn decode_uclogic(data: &[u8]) -> DeviceReport {
    match data[1] {
        STATUS_UCLOGIC_AUX => DeviceReport::Aux(AuxReport {
            report_id: data[0],
            buttons: Buttons::from_bits(le16(data, 4), 16),
            wheel: None,
        }),
        STATUS_OUT_OF_RANGE => DeviceReport::Other {
            report_id: data[0],
        },
        _ => DeviceReport::Tablet(status_pen(data, data.len() >= 10)),
    }
}

/// Huion high-resolution layout: 24-bit coordinates with the high bytes
/// trailing the pressure field, tilt in bytes 10/11.
fn decode_giano(data: &[u8]) -> DeviceReport {
    match data[1] {
        STATUS_UCLOGIC_AUX => DeviceReport::Aux(AuxReport {
            report_id: data[0],
            buttons: Buttons::from_bits(le16(data, 4), 16),
            wheel: None,
        }),
        STATUS_OUT_OF_RANGE => DeviceReport::Other {
            report_id: data[0],
        },
        _ => {
            let mut report = status_pen(data, false);
            report.x |= (data[8] as u32) << 16;
            report.y |= (data[9] as u32) << 16;
            report.tilt = Some(signed_tilt(data, 10));
            DeviceReport::Tablet(report)
        }
    }
}

fn decode_xp_pen(data: &[u8], with_tilt: bool) -> DeviceReport {
    match data[1] {
        STATUS_XP_PEN_AUX => DeviceReport::Aux(AuxReport {
            report_id: data[0],
            buttons: Buttons::from_bits(data[2] as u32, 8),
            wheel: None,
        }),
        STATUS_OUT_OF_RANGE => DeviceReport::Other {
            report_id: data[0],
        },
        _ => DeviceReport::Tablet(status_pen(data, with_tilt)),
    }
}

// -- Wacom ----------------------------------------------------

/// Bamboo / CTL pen interface.
///
/// Status byte: bit 0 tip, bits 1/2 barrel buttons, bit 3 eraser, bit 5 proximity.
/// Byte 8, when present, carries the hover distance.
fn decode_bamboo_pen(data: &[u8]) -> TabletReport {
    let status = data[1];
    let pressure = le16(data, 6);
    TabletReport {
        report_id: data[0],
        x: le16(data, 2),
        y: le16(data, 4),
        pressure,
        tilt: None,
        lift: pressure,
        tool: if bit(status, 3) {
            ToolType::Eraser
        } else {
            ToolType::Pen
        },
        in_range: bit(status, 5),
        hover_distance: data.get(8).map(|&d| d as u32),
        pen_buttons: barrel_buttons(status),
    }
}

/// Bamboo touch interface: two contacts, 11-bit big-endian coordinates.
///
/// Bit 7 of byte 1 selects the 8-byte contact stride (otherwise 9 bytes); bit 7 of
/// each contact's first byte marks it as touching.
fn decode_bamboo_touch(data: &[u8]) -> DeviceReport {
    if data[0] != BAMBOO_TOUCH_ID {
        return DeviceReport::Other {
            report_id: data[0],
        };
    }

    let stride = if bit(data[1], 7) { 8 } else { 9 };
    let touches = (0..2u8)
        .filter_map(|slot| {
            let offset = stride * slot as usize;
            bit(data[offset + 3], 7).then(|| Touch {
                slot,
                x: be16(data, offset + 3) & 0x7FF,
                y: be16(data, offset + 5) & 0x7FF,
            })
        })
        .collect();

    DeviceReport::Touch(TouchReport {
        report_id: data[0],
        touches,
    })
}

/// Intuos 4/5 style protocol.
///
/// Coordinates are 17 bits: 16 big-endian bits shifted left once, with the
/// low bit carried in byte 9. Pressure is 11 bits spread across bytes 6, 7 and 1.
/// Tilt is 7 bits per axis with a +64 bias.
fn decode_intuos_v2(data: &[u8]) -> DeviceReport {
    let report_id = data[0];
    let status = data[1];

    if report_id == INTUOS_V2_PAD_ID {
        return DeviceReport::Aux(AuxReport {
            report_id,
            buttons: Buttons::from_bits(le16(data, 2), 9),
            wheel: bit(status, 7).then_some(status & 0x7F),
        });
    }

    // Tool entering proximity
    if status & 0xFC == 0xC0 {
        return DeviceReport::Tool(ToolReport {
            report_id,
            serial: (((data[3] & 0x0F) as u64) << 28)
                + ((data[4] as u64) << 20)
                + ((data[5] as u64) << 12)
                + ((data[6] as u64) << 4)
                + ((data[7] as u64) >> 4),
            tool_id: ((data[2] as u32) << 4)
                | ((data[3] as u32) >> 4)
                | (((data[7] & 0x0F) as u32) << 16)
                | (((data[8] & 0xF0) as u32) << 8),
            tool: if bit(data[3], 7) {
                ToolType::Eraser
            } else {
                ToolType::Pen
            },
        });
    }

    let x = ((data[2] as u32) << 9) | ((data[3] as u32) << 1) | ((data[9] as u32 >> 1) & 1);
    let y = ((data[4] as u32) << 9) | ((data[5] as u32) << 1) | (data[9] as u32 & 1);
    let pressure =
        ((data[6] as u32) << 3) | ((data[7] as u32 & 0xC0) >> 5) | (status as u32 & 1);
    let tilt_x = ((((data[7] as i16) << 1) & 0x7E) | ((data[8] as i16) >> 7)) - 64;
    let tilt_y = (data[8] as i16 & 0x7F) - 64;

    DeviceReport::Tablet(TabletReport {
        report_id,
        x,
        y,
        pressure,
        tilt: Some(Tilt {
            x: tilt_x,
            y: tilt_y,
        }),
        lift: pressure,
        tool: ToolType::Pen,
        in_range: bit(status, 6),
        hover_distance: Some(data[9] as u32 >> 2),
        pen_buttons: barrel_buttons(status),
    })
}

/// Intuos (2017+) protocol: 24-bit coordinates, signed tilt, pen report ID 0x10
/// and express keys on report ID 0x11.
fn decode_intuos_v3(data: &[u8]) -> DeviceReport {
    let report_id = data[0];
    let status = data[1];

    match report_id {
        INTUOS_V3_PEN_ID => {
            let pressure = le16(data, 8);
            DeviceReport::Tablet(TabletReport {
                report_id,
                x: data[2] as u32 | (data[3] as u32) << 8 | (data[4] as u32) << 16,
                y: data[5] as u32 | (data[6] as u32) << 8 | (data[7] as u32) << 16,
                pressure,
                tilt: Some(signed_tilt(data, 10)),
                lift: pressure,
                tool: if bit(status, 4) {
                    ToolType::Eraser
                } else {
                    ToolType::Pen
                },
                in_range: bit(status, 5),
                hover_distance: Some(data[16] as u32),
                pen_buttons: barrel_buttons(status),
            })
        }
        INTUOS_V3_AUX_ID => DeviceReport::Aux(AuxReport {
            report_id,
            buttons: Buttons::from_bits(status as u32, 8),
            wheel: None,
        }),
        _ => DeviceReport::Other { report_id },
    }
}

/// Express keys in the low nibble of byte 1; other report IDs pass through.
fn decode_wacom_64b_aux(data: &[u8]) -> DeviceReport {
    let report_id = data[0];
    if report_id != WACOM_64B_AUX_ID {
        return DeviceReport::Other { report_id };
    }
    DeviceReport::Aux(AuxReport {
        report_id,
        buttons: Buttons::from_bits((data[1] & 0x0F) as u32, 4),
        wheel: None,
    })
}
