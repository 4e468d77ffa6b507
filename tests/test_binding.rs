//! Tests for `stylusd::binding` - edge-triggered tip, pen and express key bindings.

mod common;

use common::{Command, RecordingPointer, pen, specs, tablet_state};
use stylusd::binding::{BindingHandler, BindingSettings};
use stylusd::output::{AbsoluteMode, OutputPipeline};
use stylusd::geometry::Area;
use stylusd::pointer::MouseButton;
use stylusd::report::{AuxReport, Buttons, DeviceReport, TabletReport};

// ── Helpers ──────────────────────────────────────────────────

fn with_pressure(pressure: u32) -> TabletReport {
    TabletReport {
        pressure,
        ..pen(0, 0)
    }
}

fn aux(bits: u32) -> AuxReport {
    AuxReport {
        report_id: 3,
        buttons: Buttons::from_bits(bits, 4),
        wheel: None,
    }
}

// ── Tip ──────────────────────────────────────────────────────

#[test]
fn test_tip_press_and_release_are_edges() {
    let mut handler = BindingHandler::new(BindingSettings::default());
    let mut pointer = RecordingPointer::default();

    handler.handle_tablet(&with_pressure(200), &specs(), &mut pointer);
    handler.handle_tablet(&with_pressure(300), &specs(), &mut pointer);
    handler.handle_tablet(&with_pressure(0), &specs(), &mut pointer);

    assert_eq!(
        pointer.commands(),
        vec![
            Command::Button(MouseButton::Left, true),
            Command::Button(MouseButton::Left, false),
        ]
    );
}

#[test]
fn test_tip_activation_pressure() {
    let settings = BindingSettings {
        tip_activation_pressure: 50.0,
        ..BindingSettings::default()
    };
    let mut handler = BindingHandler::new(settings);
    let mut pointer = RecordingPointer::default();

    handler.handle_tablet(&with_pressure(400), &specs(), &mut pointer);
    assert!(pointer.commands().is_empty());

    handler.handle_tablet(&with_pressure(600), &specs(), &mut pointer);
    assert_eq!(pointer.commands(), vec![Command::Button(MouseButton::Left, true)]);
}

#[test]
fn test_unbound_tip_sends_nothing() {
    let settings = BindingSettings {
        tip: None,
        ..BindingSettings::default()
    };
    let mut handler = BindingHandler::new(settings);
    let mut pointer = RecordingPointer::default();
    handler.handle_tablet(&with_pressure(900), &specs(), &mut pointer);
    assert!(pointer.commands().is_empty());
}

// ── Pen and aux buttons ──────────────────────────────────────

#[test]
fn test_pen_button_binding() {
    let mut handler = BindingHandler::new(BindingSettings::default());
    let mut pointer = RecordingPointer::default();

    let mut report = with_pressure(0);
    report.pen_buttons = Buttons::from_bits(0b10, 2);
    handler.handle_tablet(&report, &specs(), &mut pointer);
    report.pen_buttons = Buttons::from_bits(0, 2);
    handler.handle_tablet(&report, &specs(), &mut pointer);

    assert_eq!(
        pointer.commands(),
        vec![
            Command::Button(MouseButton::Middle, true),
            Command::Button(MouseButton::Middle, false),
        ]
    );
}

#[test]
fn test_aux_buttons_with_gaps() {
    let settings = BindingSettings {
        aux_buttons: vec![Some(MouseButton::Back), None, Some(MouseButton::Forward)],
        ..BindingSettings::default()
    };
    let mut handler = BindingHandler::new(settings);
    let mut pointer = RecordingPointer::default();

    handler.handle_aux(&aux(0b0111), &mut pointer);
    assert_eq!(
        pointer.commands(),
        vec![
            Command::Button(MouseButton::Back, true),
            Command::Button(MouseButton::Forward, true),
        ]
    );

    pointer.clear();
    handler.handle_aux(&aux(0b0100), &mut pointer);
    assert_eq!(
        pointer.commands(),
        vec![Command::Button(MouseButton::Back, false)]
    );
}

#[test]
fn test_release_all() {
    let mut handler = BindingHandler::new(BindingSettings::default());
    let mut pointer = RecordingPointer::default();

    handler.handle_tablet(&with_pressure(500), &specs(), &mut pointer);
    pointer.clear();
    handler.release_all(&mut pointer);
    assert_eq!(pointer.commands(), vec![Command::Button(MouseButton::Left, false)]);

    pointer.clear();
    handler.release_all(&mut pointer);
    assert!(pointer.commands().is_empty());
}

// ── Pipeline ─────────────────────────────────────────────────

#[test]
fn test_pipeline_runs_bindings_while_hovering() {
    let pointer = RecordingPointer::default();
    let mut pipeline = OutputPipeline::new(
        Box::new(AbsoluteMode::new(Area::full(1920.0, 1080.0))),
        Box::new(pointer.clone()),
    )
    .with_bindings(BindingHandler::new(BindingSettings::default()));

    let mut hovering = pen(5000, 2500);
    hovering.lift = 0;
    hovering.pressure = 0;
    hovering.pen_buttons = Buttons::from_bits(0b01, 2);
    pipeline.handle(&DeviceReport::Tablet(hovering), &tablet_state(specs()));

    assert_eq!(pointer.commands(), vec![Command::Button(MouseButton::Right, true)]);
}

#[test]
fn test_dropping_pipeline_releases_held_buttons() {
    let pointer = RecordingPointer::default();
    let mut pipeline = OutputPipeline::new(
        Box::new(AbsoluteMode::new(Area::full(1920.0, 1080.0))),
        Box::new(pointer.clone()),
    )
    .with_bindings(BindingHandler::new(BindingSettings::default()));

    pipeline.handle(&DeviceReport::Tablet(pen(5000, 2500)), &tablet_state(specs()));
    pointer.clear();
    drop(pipeline);
    assert_eq!(pointer.commands(), vec![Command::Button(MouseButton::Left, false)]);
}
