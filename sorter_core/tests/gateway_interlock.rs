//! Interlock and rejection handling seen through the cell: scripted
//! telemetry on a recording wire, raw commands from the operator side.

use std::sync::Arc;

use sorter_core::mocks::{RecordingTransport, VecCatalog};
use sorter_core::{ActuatorTable, Cell, PlannerState, Rejection};
use sorter_traits::clock::test_clock::TestClock;
use sorter_traits::{DetectedObject, Shape, TargetSpec, TargetStatus};

struct Scripted {
    wire: RecordingTransport,
    clock: TestClock,
    cell: Cell,
}

impl Scripted {
    fn new() -> Self {
        let wire = RecordingTransport::new();
        let clock = TestClock::new();
        let catalog = VecCatalog::new(vec![TargetSpec {
            common_id: "A".into(),
            length_mm: 60.0,
            width_mm: 40.0,
            height_mm: 20.0,
            shape: Shape::Box,
            status: TargetStatus::Pending,
        }]);
        let mut cell = Cell::builder()
            .with_transport(wire.clone())
            .with_catalog(catalog)
            .with_actuators(ActuatorTable::stock(60.0, 30.0))
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        cell.home().unwrap();
        Self { wire, clock, cell }
    }

    fn tick_after(&mut self, ms: u64, lines: &[&str]) -> sorter_core::TickReport {
        self.clock.advance_ms(ms);
        for l in lines {
            self.wire.push_inbound(*l);
        }
        self.cell.tick()
    }

    /// Walk one upright box up to the second-table push.
    fn drive_to_pushing3(&mut self) {
        self.tick_after(0, &["HT 278"]);
        self.tick_after(20, &["b21"]);
        self.tick_after(20, &["b20"]);
        assert_eq!(self.cell.state(), PlannerState::Pushing1);
        self.tick_after(20, &[]);
        self.cell.publisher().publish(DetectedObject {
            length_mm: 60.0,
            width_mm: 40.0,
            height_mm: 0.0,
            shape: Shape::Box,
            center_x: 720.0,
            center_y: 600.0,
            angle_deg: 0.0,
        });
        self.tick_after(500, &["GO2"]);
        assert_eq!(self.cell.state(), PlannerState::WaitForClearance);
        self.tick_after(1_000, &["STOP2"]);
        assert_eq!(self.cell.state(), PlannerState::Rotating);
        self.tick_after(20, &[]);
        self.tick_after(600, &[]);
        assert_eq!(self.cell.state(), PlannerState::PreparingFlip);
        self.tick_after(20, &[]);
        self.tick_after(20, &[]);
        assert_eq!(self.cell.state(), PlannerState::WaitForPushing2);
        self.tick_after(5_000, &["GO2"]);
        assert_eq!(self.cell.state(), PlannerState::WaitForPushing3);
        self.tick_after(200, &["STOP2"]);
        assert_eq!(self.cell.state(), PlannerState::WaitForConveyor2);
        self.tick_after(2_100, &[]);
        assert_eq!(self.cell.state(), PlannerState::Pushing3);
    }
}

#[test]
fn pusher2_is_held_until_flipper2_returns_to_clear() {
    let mut s = Scripted::new();
    s.drive_to_pushing3();

    // Operator moves flipper 2 out of the way of the clear position.
    assert_eq!(s.cell.send_raw("POS 4 10").unwrap(), "POS 4 10");
    s.wire.clear_sent();

    for _ in 0..3 {
        let report = s.tick_after(20, &[]);
        assert!(matches!(
            report.rejected,
            Some(Rejection::Interlock {
                required: 200,
                actual: Some(10)
            })
        ));
        assert_eq!(report.state, PlannerState::Pushing3);
    }
    assert!(s.wire.sent().is_empty());

    s.cell.send_raw("POS 4 200").unwrap();
    let report = s.tick_after(20, &[]);
    assert!(report.rejected.is_none());
    assert_eq!(report.state, PlannerState::WaitForPushing5);
    assert_eq!(s.wire.sent(), vec!["POS 4 200".to_string(), "SET 6 FWD 8333".to_string()]);
}

#[test]
fn failed_write_is_retried_on_the_next_tick() {
    let mut s = Scripted::new();
    s.drive_to_pushing3();

    s.wire.fail_writes(true);
    let report = s.tick_after(20, &[]);
    assert!(matches!(report.rejected, Some(Rejection::WriteFailed(_))));
    assert_eq!(s.cell.state(), PlannerState::Pushing3);
    assert_eq!(s.cell.gateway().write_faults(), 1);

    s.wire.fail_writes(false);
    let report = s.tick_after(20, &[]);
    assert_eq!(report.commands, 1);
    assert_eq!(s.cell.state(), PlannerState::WaitForPushing5);
}

#[test]
fn raw_commands_are_checked_like_planner_commands() {
    let mut s = Scripted::new();
    s.wire.clear_sent();

    assert!(matches!(s.cell.send_raw("SET 6 FWD 1000"), Ok(_)));
    assert!(matches!(
        s.cell.send_raw("SET 2 FWD 6000"),
        Err(Rejection::DistanceOutOfRange { id: 1, .. })
    ));
    assert!(matches!(s.cell.send_raw("SET 9 FWD"), Err(Rejection::UnknownServo(9))));
    assert!(matches!(s.cell.send_raw("JUMP 1"), Err(Rejection::Malformed(_))));
    assert!(matches!(s.cell.send_raw("POS 3 55"), Err(Rejection::Malformed(_))));

    s.cell.send_raw("POS 4 100").unwrap();
    assert!(matches!(
        s.cell.send_raw("SET 6 FWD 1000"),
        Err(Rejection::Interlock { .. })
    ));
    assert_eq!(
        s.wire.sent(),
        vec!["SET 6 FWD 1000".to_string(), "POS 4 100".to_string()]
    );
}

#[test]
fn telemetry_noise_is_ignored() {
    let mut s = Scripted::new();
    let report = s.tick_after(20, &["", "hello", "b21", "HT x"]);
    assert_eq!(report.events, 1);
    assert!(s.cell.sensors().beam2_is_broken());
}
