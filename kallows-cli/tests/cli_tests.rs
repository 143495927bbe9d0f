//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;

/// Build command for the kallows binary (finds it in target/debug when run via cargo test).
fn kallows_cli() -> Command {
    cargo_bin_cmd!("kallows")
}

/// Path to kallows library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("kallows")
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = kallows_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("KiCad"))
        .stdout(predicate::str::contains("panelize"))
        .stdout(predicate::str::contains("lookup"));
}

#[test]
fn test_cli_version() {
    let mut cmd = kallows_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_preset_dump() {
    let mut cmd = kallows_cli();

    cmd.arg("preset")
        .arg("--spacing")
        .arg("4mm")
        .arg("-s")
        .arg("cuts.type=vcuts");

    let output = cmd.assert().success().get_output().stdout.clone();
    let preset: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(preset["cuts"]["type"], "vcuts");
    assert_eq!(preset["layout"]["hspace"], "4mm");
    assert_eq!(preset["framing"]["type"], "railslr");
}

#[test]
fn test_cli_preset_unknown_key() {
    let mut cmd = kallows_cli();

    cmd.arg("preset").arg("-s").arg("cuts.depth=1mm");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_cli_panelize() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("panel.kicad_pcb");
    let mut cmd = kallows_cli();

    cmd.arg("panelize")
        .arg("--board")
        .arg(fixtures_dir().join("sensor_a.kicad_pcb"))
        .arg("--board")
        .arg(fixtures_dir().join("driver_b.kicad_pcb"))
        .arg("--output")
        .arg(&output);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Board 2:"))
        .stdout(predicate::str::contains("Tooling:  3 holes"));

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.contains("Board_2-GND"));
}

#[test]
fn test_cli_panelize_json_summary() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("panel.kicad_pcb");
    let mut cmd = kallows_cli();

    cmd.arg("panelize")
        .arg("-b")
        .arg(fixtures_dir().join("sensor_a.kicad_pcb"))
        .arg("-o")
        .arg(&output)
        .arg("--spacing")
        .arg("0.2in")
        .arg("--format")
        .arg("json");

    let stdout = cmd.assert().success().get_output().stdout.clone();
    let summary: serde_json::Value = serde_json::from_slice(&stdout).unwrap();
    assert_eq!(summary["substrates"].as_array().map(Vec::len), Some(1));
    assert_eq!(summary["tooling_holes"], 3);
}

#[test]
fn test_cli_panelize_missing_board() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("panel.kicad_pcb");
    let mut cmd = kallows_cli();

    cmd.arg("panelize")
        .arg("--board")
        .arg(fixtures_dir().join("nonexistent.kicad_pcb"))
        .arg("--output")
        .arg(&output);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("nonexistent.kicad_pcb"));
    assert!(!output.exists());
}

#[test]
fn test_cli_panelize_bad_spacing() {
    let mut cmd = kallows_cli();

    cmd.arg("panelize")
        .arg("--board")
        .arg(fixtures_dir().join("sensor_a.kicad_pcb"))
        .arg("--output")
        .arg("panel.kicad_pcb")
        .arg("--spacing")
        .arg("three");

    cmd.assert().failure();
}

#[test]
fn test_cli_panelize_infinite_spacing() {
    let mut cmd = kallows_cli();

    cmd.arg("panelize")
        .arg("--board")
        .arg(fixtures_dir().join("sensor_a.kicad_pcb"))
        .arg("--output")
        .arg("panel.kicad_pcb")
        .arg("--spacing")
        .arg("1e400mm");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("finite"));
}

#[test]
fn test_cli_lookup() {
    let server = MockServer::start();
    let found = server.mock(|when, then| {
        when.method(GET)
            .path("/search")
            .query_param("partnumber", "LM358DR")
            .header("Authorization", "Bearer cli-key");
        then.status(200).body(r#"{"SearchResults":{"NumberOfResult":1}}"#);
    });
    for mpn in ["RC0603FR-0710KL", "NOPE-404"] {
        server.mock(|when, then| {
            when.method(GET).path("/search").query_param("partnumber", mpn);
            then.status(404);
        });
    }

    let mut cmd = kallows_cli();
    cmd.arg("lookup")
        .arg(fixtures_dir().join("parts.csv"))
        .arg("--format")
        .arg("compact")
        .env("MOUSER_API_KEY", "cli-key")
        .env("MOUSER_API_URL", server.url("/search"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#"{"SearchResults":{"NumberOfResult":1}}"#))
        .stdout(predicate::str::contains(
            "Failed to fetch part number: NOPE-404 (HTTP 404)",
        ));
    found.assert();
}

#[test]
fn test_cli_lookup_fail_on_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(500);
    });

    let mut cmd = kallows_cli();
    cmd.arg("lookup")
        .arg(fixtures_dir().join("parts.csv"))
        .arg("--api-key")
        .arg("cli-key")
        .arg("--endpoint")
        .arg(server.url("/search"))
        .arg("--fail-on-error")
        .env_remove("MOUSER_API_KEY")
        .env_remove("MOUSER_API_URL");

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("Failed to fetch part number"));
}

#[test]
fn test_cli_lookup_requires_key() {
    let mut cmd = kallows_cli();

    cmd.arg("lookup")
        .arg(fixtures_dir().join("parts.csv"))
        .env_remove("MOUSER_API_KEY");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("MOUSER_API_KEY"));
}
