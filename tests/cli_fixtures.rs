use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_keyfall_cli"))
}

fn fixture_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

#[test]
fn simulate_fixture_succeeds() {
    let output = cli()
        .args(["simulate", "--fixture", "missed_c4"])
        .output()
        .expect("failed to run keyfall_cli simulate");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("session report JSON payload");
    assert_eq!(json["scenario"], "missed_c4");
    assert_eq!(json["pauses"][0]["reason"], "gate");
    assert!(json.get("events").is_none(), "events are opt-in");
}

#[test]
fn simulate_fixture_detects_mismatch() {
    let output = cli()
        .args([
            "simulate",
            "--fixture",
            "missed_c4",
            "--expect",
            &fixture_file("missed_c4_incorrect.expect.json"),
        ])
        .output()
        .expect("failed to run mismatch simulate");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("\"failures\""),
        "expected diff JSON in stderr, got {stderr}"
    );
}

#[test]
fn simulate_with_events_includes_log() {
    let output = cli()
        .args(["simulate", "--fixture", "held_c4", "--events"])
        .output()
        .expect("failed to run simulate --events");
    assert!(output.status.success());
    let json: Value =
        serde_json::from_slice(&output.stdout).expect("session report JSON payload");
    let events = json["events"].as_array().expect("events array");
    assert!(events
        .iter()
        .any(|record| record["event"]["type"] == "zone_entered"));
}

#[test]
fn unknown_fixture_fails() {
    let output = cli()
        .args(["simulate", "--fixture", "no_such_scenario"])
        .output()
        .expect("failed to run simulate");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn stream_prints_one_record_per_line() {
    let output = cli()
        .args(["stream", "--fixture", "empty_timeline"])
        .output()
        .expect("failed to run stream");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let kinds: Vec<String> = stdout
        .lines()
        .map(|line| {
            let record: Value = serde_json::from_str(line).expect("JSON line");
            record["event"]["type"].as_str().unwrap_or_default().to_string()
        })
        .collect();
    assert!(kinds.contains(&"playback_started".to_string()));
    assert!(kinds.contains(&"timeline_ended".to_string()));
}

#[test]
fn lanes_lists_every_column() {
    let output = cli()
        .args(["lanes", "--width", "520"])
        .output()
        .expect("failed to run lanes");
    assert!(output.status.success());
    let columns: Value = serde_json::from_slice(&output.stdout).expect("lane JSON");
    let columns = columns.as_array().expect("array of columns");
    assert_eq!(columns.len(), 88);
    assert_eq!(columns[0]["label"], "A0");
    assert_eq!(columns[0]["width"], 10.0);
    assert_eq!(columns[1]["label"], "A#0");
}

#[test]
fn dump_fixtures_lists_assets() {
    let output = cli()
        .arg("dump-fixtures")
        .output()
        .expect("failed to run dump-fixtures");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(
        stdout.contains("held_c4"),
        "expected fixture listing, got {stdout}"
    );
    assert!(!stdout.contains("missed_c4_incorrect"));
}
