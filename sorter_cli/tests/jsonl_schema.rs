use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir) -> PathBuf {
    let shipped = fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../etc/sorter_config.toml"
    ))
    .unwrap();
    let csv = dir.path().join("catalog.csv");
    fs::write(
        &csv,
        "common_id,length,width,height,shape,status\nA-100,60,40,20,box,pending\n",
    )
    .unwrap();
    let toml = shipped
        .replace("path = \"etc/catalog.csv\"", &format!("path = \"{}\"", csv.display()))
        .replace("port = \"/dev/ttyACM0\"", "port = \"/dev/sorter-test-missing-port\"")
        .replace("tick_ms = 20", "tick_ms = 1");
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_line(stdout: &[u8], key: &str) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(stdout);
    let line = stdout
        .lines()
        .find(|l| l.contains(&format!("\"{key}\"")))
        .unwrap_or("")
        .to_string();
    assert!(
        !line.is_empty(),
        "no JSON line with {key} found; stdout was: {stdout}"
    );
    serde_json::from_str(&line).expect("valid JSON")
}

/// Validate the JSON summary of a simulated run.
#[rstest]
fn json_run_summary_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);

    let mut cmd = Command::cargo_bin("sorter").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--sim")
        .arg("--ticks")
        .arg("30");

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = json_line(&out, "processed");

    assert!(v.get("timestamp").and_then(|x| x.as_u64()).is_some());
    assert_eq!(v.get("ticks").and_then(|x| x.as_u64()), Some(30));
    assert!(v.get("processed").and_then(|x| x.as_u64()).is_some());
    assert_eq!(v.get("drained").and_then(|x| x.as_u64()), Some(6));
    assert!(v.get("duration_ms").and_then(|x| x.as_u64()).is_some());
    assert!(v.get("final_state").and_then(|x| x.as_str()).is_some());
    for key in ["catalog_faults", "write_faults", "detections", "sim_delivered"] {
        assert!(v.get(key).and_then(|x| x.as_u64()).is_some(), "{key} should be a number");
    }
}

/// Errors are a single `{reason, message}` object on stdout in JSON mode.
#[rstest]
fn json_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);

    let mut cmd = Command::cargo_bin("sorter").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("run");

    let out = cmd.assert().code(3).get_output().stdout.clone();
    let v = json_line(&out, "reason");
    assert_eq!(v.get("reason").and_then(|x| x.as_str()), Some("TransportConnect"));
    assert!(
        v.get("message")
            .and_then(|x| x.as_str())
            .is_some_and(|m| m.starts_with("What happened"))
    );
}

#[rstest]
fn json_match_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);

    let mut cmd = Command::cargo_bin("sorter").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .args(["match", "--length", "62", "--width", "41", "--height", "20"]);

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = json_line(&out, "found");
    assert_eq!(v["found"], true);
    assert_eq!(v["target_id"], "A-100");
    assert!(v["deviation_mm"].as_f64().is_some_and(|d| d >= 0.0));
    assert_eq!(v["target"]["length_mm"].as_f64(), Some(60.0));
}
