use rstest::rstest;
use sorter_config::{
    ActuatorEntry, CatalogBackend, DeviceKind, MatchMode, load_toml,
};

const BASE: &str = r#"
[serial]
port = "/dev/ttyACM0"

[camera]
mm_per_pixel = 0.5
frame_width_px = 1440
frame_height_px = 1080

[[actuators]]
kind = "conveyor"
id = 1
servo = 0

[[actuators]]
kind = "rotator"
id = 1
servo = 1

[[actuators]]
kind = "pusher"
id = 1
servo = 2
mm_per_s = 60.0

[[actuators]]
kind = "flipper"
id = 1
servo = 3
clear = 0
enter = 110
exit = 185

[[actuators]]
kind = "flipper"
id = 2
servo = 4
clear = 200
enter = 10
exit = 100

[[actuators]]
kind = "conveyor"
id = 2
servo = 5

[[actuators]]
kind = "pusher"
id = 2
servo = 6
mm_per_s = 30.0

[[actuators]]
kind = "rotator"
id = 2
servo = 7
"#;

fn validate_err(toml: &str) -> String {
    let cfg = load_toml(toml).expect("parse TOML");
    format!("{}", cfg.validate().expect_err("config should be rejected"))
}

#[test]
fn minimal_config_fills_defaults() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("valid config should pass");

    assert_eq!(cfg.serial.baud, 9600);
    assert_eq!(cfg.camera.sample_rate_hz, 15);
    assert_eq!(cfg.height.window, 10);
    assert!((cfg.height.scale + 1.305).abs() < 1e-6);
    assert!((cfg.motion.pusher_max_distance_mm - 300.0).abs() < 1e-6);
    assert_eq!(cfg.motion.flip_dwell_ms, 5000);
    assert!((cfg.matching.tolerance - 0.10).abs() < 1e-6);
    assert_eq!(cfg.matching.status_filter, "pending");
    assert_eq!(cfg.matching.mode, MatchMode::Footprint);
    assert_eq!(cfg.catalog.backend, CatalogBackend::Csv);
    assert_eq!(cfg.runner.tick_ms, 20);
    assert_eq!(cfg.runner.max_ticks, 0);
}

#[test]
fn shipped_config_is_valid() {
    let text = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../etc/sorter_config.toml"
    ))
    .expect("read etc/sorter_config.toml");
    let cfg = load_toml(&text).expect("parse TOML");
    cfg.validate().expect("shipped config should pass");
    assert_eq!(cfg.interlock_clear_setpoint(), Some(200));
}

#[test]
fn actuator_lookup_and_interlock_setpoint() {
    let cfg = load_toml(BASE).unwrap();
    assert_eq!(
        cfg.actuator(DeviceKind::Pusher, 2),
        Some(&ActuatorEntry::Pusher {
            id: 2,
            servo: 6,
            mm_per_s: 30.0
        })
    );
    assert_eq!(cfg.actuator(DeviceKind::Rotator, 3), None);
    assert_eq!(cfg.interlock_clear_setpoint(), Some(200));
}

#[rstest]
#[case("[camera]\nmm_per_pixel = 0.5", "[camera]\nsample_rate_hz = 0\nmm_per_pixel = 0.5", "camera.sample_rate_hz must be > 0")]
#[case("mm_per_pixel = 0.5", "mm_per_pixel = 0.0", "camera.mm_per_pixel must be > 0")]
#[case("port = \"/dev/ttyACM0\"", "port = \"  \"", "serial.port must not be empty")]
#[case("port = \"/dev/ttyACM0\"", "port = \"/dev/ttyACM0\"\nbaud = 0", "serial.baud must be > 0")]
#[case("mm_per_s = 30.0", "mm_per_s = 0.0", "pusher 2 mm_per_s must be > 0")]
#[case("enter = 10", "enter = 200", "flipper 2 setpoints must be distinct")]
#[case("servo = 7", "servo = 6", "servo 6 is assigned twice")]
fn rejects_invalid_field(#[case] from: &str, #[case] to: &str, #[case] expected: &str) {
    let toml = BASE.replacen(from, to, 1);
    assert_ne!(toml, BASE, "case did not change the config");
    let msg = validate_err(&toml);
    assert!(msg.contains(expected), "got: {msg}");
}

#[rstest]
#[case("[height]\nwindow = 0\n", "height.window must be >= 1")]
#[case("[height]\nscale = 0.0\n", "height.scale must be finite and non-zero")]
#[case("[height]\nmax_valid_mm = -1.0\n", "height.max_valid_mm must be > 0")]
#[case("[motion]\nfull_travel_mm = 400.0\n", "motion.full_travel_mm must not exceed motion.pusher_max_distance_mm")]
#[case("[motion]\nstaging_mm = 0.0\n", "motion.staging_mm must be > 0")]
#[case("[motion]\nclearance_margin_mm = -2.0\n", "motion.clearance_margin_mm must be >= 0")]
#[case("[matching]\ntolerance = 1.0\n", "matching.tolerance must be in [0.0, 1.0)")]
#[case("[catalog]\nbackend = \"sqlite\"\n", "catalog.path is required for the sqlite backend")]
#[case("[catalog]\nbackend = \"json\"\n", "catalog.path is required for the json backend")]
#[case("[runner]\ntick_ms = 0\n", "runner.tick_ms must be >= 1")]
fn rejects_invalid_section(#[case] section: &str, #[case] expected: &str) {
    let toml = format!("{section}{BASE}");
    let msg = validate_err(&toml);
    assert!(msg.contains(expected), "got: {msg}");
}

#[test]
fn rejects_missing_flipper2() {
    let toml = BASE.replacen(
        "kind = \"flipper\"\nid = 2\nservo = 4\nclear = 200\nenter = 10\nexit = 100\n",
        "kind = \"rotator\"\nid = 3\nservo = 4\n",
        1,
    );
    let msg = validate_err(&toml);
    assert!(msg.contains("actuators: missing flipper 2"), "got: {msg}");
}

#[test]
fn rejects_duplicate_device_entry() {
    let toml = format!("{BASE}\n[[actuators]]\nkind = \"conveyor\"\nid = 1\nservo = 9\n");
    let msg = validate_err(&toml);
    assert!(msg.contains("duplicate entry for conveyor 1"), "got: {msg}");
}

#[test]
fn unknown_actuator_kind_fails_to_parse() {
    let toml = format!("{BASE}\n[[actuators]]\nkind = \"gripper\"\nid = 1\nservo = 9\n");
    assert!(load_toml(&toml).is_err());
}

#[test]
fn sorted_dimensions_mode_parses() {
    let toml = format!("[matching]\nmode = \"sorted_dimensions\"\n{BASE}");
    let cfg = load_toml(&toml).unwrap();
    assert_eq!(cfg.matching.mode, MatchMode::SortedDimensions);
}
