//! Pointer backends: where the output pipeline sends cursor motion.
//!
//! On Linux the pointer is a uinput virtual device created through `evdev`:
//! an absolute device for absolute mode, a relative mouse for relative mode.
use std::io;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, RelativeAxisType,
    UinputAbsSetup,
};
use log::debug;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use thiserror::Error;

use crate::geometry::Point;

#[derive(Debug, Error)]
pub enum PointerError {
    #[error("Failed to create virtual pointer: {0}")]
    Create(#[source] io::Error),

    #[error("Failed to emit pointer event: {0}")]
    Emit(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    fn key(self) -> Key {
        match self {
            MouseButton::Left => Key::BTN_LEFT,
            MouseButton::Right => Key::BTN_RIGHT,
            MouseButton::Middle => Key::BTN_MIDDLE,
            MouseButton::Back => Key::BTN_BACK,
            MouseButton::Forward => Key::BTN_FORWARD,
        }
    }
}

/// Platform pointer control.
pub trait Pointer: Send {
    fn set_absolute_position(&mut self, position: Point) -> Result<(), PointerError>;

    fn move_relative(&mut self, delta: Point) -> Result<(), PointerError>;

    /// Current cursor position, when the backend can know it.
    fn current_position(&self) -> Option<Point>;

    fn set_button(&mut self, button: MouseButton, pressed: bool) -> Result<(), PointerError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axes {
    Absolute,
    Relative,
}

/// uinput virtual pointer.
pub struct EvdevPointer {
    device: VirtualDevice,
    axes: Axes,
    /// Last absolute position written (absolute device only).
    position: Option<Point>,
    /// Sub-pixel motion not yet emitted (relative device only).
    remainder: Point,
}

fn button_keys() -> AttributeSet<Key> {
    let mut keys = AttributeSet::<Key>::new();
    for button in MouseButton::iter() {
        keys.insert(button.key());
    }
    keys
}

impl EvdevPointer {
    /// Absolute pointer spanning a `width` x `height` pixel virtual screen.
    pub fn absolute(width: u32, height: u32) -> Result<Self, PointerError> {
        let max_x = i32::try_from(width.max(1)).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height.max(1)).unwrap_or(i32::MAX);
        let device = VirtualDeviceBuilder::new()
            .and_then(|b| b.name("stylusd virtual tablet").with_keys(&button_keys()))
            .and_then(|b| {
                b.with_absolute_axis(&UinputAbsSetup::new(
                    AbsoluteAxisType::ABS_X,
                    AbsInfo::new(0, 0, max_x, 0, 0, 1),
                ))
            })
            .and_then(|b| {
                b.with_absolute_axis(&UinputAbsSetup::new(
                    AbsoluteAxisType::ABS_Y,
                    AbsInfo::new(0, 0, max_y, 0, 0, 1),
                ))
            })
            .and_then(|b| b.build())
            .map_err(PointerError::Create)?;
        debug!("Created virtual tablet {width}x{height}");
        Ok(Self {
            device,
            axes: Axes::Absolute,
            position: None,
            remainder: Point::ORIGIN,
        })
    }

    /// Relative mouse.
    pub fn relative() -> Result<Self, PointerError> {
        let mut rel = AttributeSet::<RelativeAxisType>::new();
        rel.insert(RelativeAxisType::REL_X);
        rel.insert(RelativeAxisType::REL_Y);
        let device = VirtualDeviceBuilder::new()
            .and_then(|b| b.name("stylusd virtual mouse").with_keys(&button_keys()))
            .and_then(|b| b.with_relative_axes(&rel))
            .and_then(|b| b.build())
            .map_err(PointerError::Create)?;
        debug!("Created virtual mouse");
        Ok(Self {
            device,
            axes: Axes::Relative,
            position: None,
            remainder: Point::ORIGIN,
        })
    }

    fn emit(&mut self, events: &[InputEvent]) -> Result<(), PointerError> {
        self.device.emit(events).map_err(PointerError::Emit)
    }
}

impl Pointer for EvdevPointer {
    fn set_absolute_position(&mut self, position: Point) -> Result<(), PointerError> {
        match self.axes {
            Axes::Absolute => {
                self.position = Some(position);
                self.emit(&[
                    InputEvent::new(
                        EventType::ABSOLUTE,
                        AbsoluteAxisType::ABS_X.0,
                        position.x.round() as i32,
                    ),
                    InputEvent::new(
                        EventType::ABSOLUTE,
                        AbsoluteAxisType::ABS_Y.0,
                        position.y.round() as i32,
                    ),
                ])
            }
            // A relative device has no idea where the cursor is; nothing sensible to do.
            Axes::Relative => Ok(()),
        }
    }

    fn move_relative(&mut self, delta: Point) -> Result<(), PointerError> {
        match self.axes {
            Axes::Absolute => {
                let base = self.position.unwrap_or(Point::ORIGIN);
                self.set_absolute_position(base + delta)
            }
            Axes::Relative => {
                let total = delta + self.remainder;
                let whole = Point::new(total.x.trunc(), total.y.trunc());
                self.remainder = total - whole;
                if whole == Point::ORIGIN {
                    return Ok(());
                }
                self.emit(&[
                    InputEvent::new(
                        EventType::RELATIVE,
                        RelativeAxisType::REL_X.0,
                        whole.x as i32,
                    ),
                    InputEvent::new(
                        EventType::RELATIVE,
                        RelativeAxisType::REL_Y.0,
                        whole.y as i32,
                    ),
                ])
            }
        }
    }

    fn current_position(&self) -> Option<Point> {
        self.position
    }

    fn set_button(&mut self, button: MouseButton, pressed: bool) -> Result<(), PointerError> {
        self.emit(&[InputEvent::new(
            EventType::KEY,
            button.key().code(),
            i32::from(pressed),
        )])
    }
}
