//! Pen tip, pen button and express key bindings to mouse buttons.
use log::debug;

use crate::pointer::{MouseButton, Pointer};
use crate::report::{AuxReport, Buttons, TabletReport};
use crate::tablet::TabletSpecifications;

/// What each physical input presses. `None` leaves an input unbound.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingSettings {
    pub tip: Option<MouseButton>,
    /// Percent of the tablet's maximum pressure the tip must exceed.
    pub tip_activation_pressure: f64,
    pub pen_buttons: Vec<Option<MouseButton>>,
    pub aux_buttons: Vec<Option<MouseButton>>,
}

impl Default for BindingSettings {
    fn default() -> Self {
        Self {
            tip: Some(MouseButton::Left),
            tip_activation_pressure: 0.0,
            pen_buttons: vec![Some(MouseButton::Right), Some(MouseButton::Middle)],
            aux_buttons: Vec::new(),
        }
    }
}

/// Turns button state into press/release edges.
#[derive(Debug)]
pub struct BindingHandler {
    settings: BindingSettings,
    tip_down: bool,
    pen_state: Buttons,
    aux_state: Buttons,
}

impl BindingHandler {
    pub fn new(settings: BindingSettings) -> Self {
        Self {
            settings,
            tip_down: false,
            pen_state: Buttons::default(),
            aux_state: Buttons::default(),
        }
    }

    pub fn settings(&self) -> &BindingSettings {
        &self.settings
    }

    pub fn handle_tablet(
        &mut self,
        report: &TabletReport,
        specs: &TabletSpecifications,
        pointer: &mut dyn Pointer,
    ) {
        let threshold =
            f64::from(specs.max_pressure) * self.settings.tip_activation_pressure / 100.0;
        let tip = f64::from(report.pressure) > threshold;
        if tip != self.tip_down {
            self.tip_down = tip;
            press(pointer, self.settings.tip, tip);
        }

        update_buttons(
            &mut self.pen_state,
            &report.pen_buttons,
            &self.settings.pen_buttons,
            pointer,
        );
    }

    pub fn handle_aux(&mut self, report: &AuxReport, pointer: &mut dyn Pointer) {
        update_buttons(
            &mut self.aux_state,
            &report.buttons,
            &self.settings.aux_buttons,
            pointer,
        );
    }

    /// Release every input currently held.
    pub fn release_all(&mut self, pointer: &mut dyn Pointer) {
        if self.tip_down {
            self.tip_down = false;
            press(pointer, self.settings.tip, false);
        }
        let empty = Buttons::default();
        update_buttons(&mut self.pen_state, &empty, &self.settings.pen_buttons, pointer);
        update_buttons(&mut self.aux_state, &empty, &self.settings.aux_buttons, pointer);
    }
}

fn press(pointer: &mut dyn Pointer, binding: Option<MouseButton>, pressed: bool) {
    if let Some(button) = binding {
        if let Err(e) = pointer.set_button(button, pressed) {
            debug!("Failed to set {button}: {e}");
        }
    }
}

fn update_buttons(
    state: &mut Buttons,
    current: &Buttons,
    bindings: &[Option<MouseButton>],
    pointer: &mut dyn Pointer,
) {
    let count = state.len().max(current.len()).min(32);
    for index in 0..count {
        let was = state.get(index);
        let now = current.get(index);
        if was != now {
            press(pointer, bindings.get(index).copied().flatten(), now);
        }
    }
    *state = *current;
}
