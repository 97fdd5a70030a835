#![allow(deprecated)] // cargo_bin deprecation in assert_cmd 2.1+; replacement macro requires restructuring
//! Integration tests for the `heliotime` binary.
//!
//! Every case uses coordinate input so nothing leaves the machine.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

const CONFIG_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/config.json");

/// A command with no configuration leaking in from the surrounding shell.
fn heliotime() -> Command {
    let mut cmd = Command::cargo_bin("heliotime").unwrap();
    for var in [
        "ENV",
        "MAX_RANGE_DAYS",
        "CACHE_TTL_SECONDS",
        "DEV_CROSSCHECK",
        "DEV_CROSSCHECK_PROVIDER",
        "DEV_CROSSCHECK_TOLERANCE_SECONDS",
        "DEV_CROSSCHECK_ENFORCE",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ── sun ──────────────────────────────────────────────────────────────────────

#[test]
fn sun_for_coordinates_prints_one_day() {
    let output = heliotime()
        .args(["sun", "--lat", "51.5074", "--lon", "-0.1278", "--date", "2025-09-01"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["request"]["algorithm"], "NREL_SPA_2005");
    assert_eq!(json["request"]["timezone"], "Europe/London");
    assert_eq!(json["days"].as_array().unwrap().len(), 1);
    let sunrise = json["days"][0]["sunrise"].as_str().unwrap();
    assert!(sunrise.starts_with("2025-09-01T06:13"), "sunrise {}", sunrise);
    assert!(sunrise.ends_with("+01:00"));
}

#[test]
fn sun_range_prints_one_record_per_day() {
    let output = heliotime()
        .args([
            "--compact",
            "sun",
            "--gps",
            "64.1466,-21.9426",
            "--start-date",
            "2025-06-01",
            "--end-date",
            "2025-06-03",
            "--no-twilight",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    // Compact output is a single line.
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim_end().lines().count(), 1);

    let json = stdout_json(&output);
    let days = json["days"].as_array().unwrap();
    assert_eq!(days.len(), 3);
    assert_eq!(days[0]["date"], "2025-06-01");
    assert_eq!(days[2]["date"], "2025-06-03");
    assert!(days.iter().all(|d| d["civil_dawn"].is_null()));
    assert_eq!(json["request"]["start_date"], "2025-06-01");
}

#[test]
fn sun_with_timezone_override() {
    let output = heliotime()
        .args([
            "sun", "--lat", "51.5074", "--lon", "-0.1278", "--date", "2025-09-01", "--tz", "UTC",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["request"]["timezone"], "UTC");
    assert!(json["days"][0]["sunset"].as_str().unwrap().ends_with("+00:00"));
}

#[test]
fn dev_crosscheck_is_ignored_in_prod() {
    let output = heliotime()
        .args([
            "--env",
            "prod",
            "sun",
            "--lat",
            "51.5074",
            "--lon",
            "-0.1278",
            "--date",
            "2025-09-01",
            "--dev-crosscheck",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout_json(&output)["meta"].get("dev_crosscheck").is_none());
}

// ── errors ───────────────────────────────────────────────────────────────────

#[test]
fn missing_location_is_invalid_input() {
    heliotime()
        .args(["sun", "--date", "2025-09-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\":\"invalid_input\""))
        .stderr(predicate::str::contains("\"status\":400"));
}

#[test]
fn conflicting_location_forms_are_invalid_input() {
    heliotime()
        .args(["sun", "--lat", "51.5", "--lon", "-0.12", "--city", "London", "--country", "UK"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_input"));
}

#[test]
fn range_over_limit_is_rejected() {
    heliotime()
        .args([
            "sun",
            "--lat",
            "51.5074",
            "--lon",
            "-0.1278",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2025-01-01",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("\"status\":400"));
}

#[test]
fn max_range_days_comes_from_environment() {
    heliotime()
        .env("MAX_RANGE_DAYS", "2")
        .args([
            "sun",
            "--lat",
            "51.5074",
            "--lon",
            "-0.1278",
            "--start-date",
            "2025-09-01",
            "--end-date",
            "2025-09-03",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_input"));
}

#[test]
fn unknown_timezone_is_invalid_input() {
    heliotime()
        .args([
            "sun", "--lat", "51.5", "--lon", "-0.12", "--date", "2025-09-01", "--tz", "Moon/Base",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_input"));
}

#[test]
fn malformed_date_is_a_usage_error() {
    heliotime()
        .args(["sun", "--lat", "51.5", "--lon", "-0.12", "--date", "2025-13-01"])
        .assert()
        .failure()
        .code(2);
}

// ── position ─────────────────────────────────────────────────────────────────

#[test]
fn position_matches_reference_vector() {
    let output = heliotime()
        .args([
            "position",
            "--lat",
            "39.742476",
            "--lon",
            "-105.1786",
            "--elevation-m",
            "1830.14",
            "--pressure-hpa",
            "820",
            "--temperature-c",
            "11",
            "--delta-t",
            "67",
            "--at",
            "2003-10-17T19:30:30Z",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    let zenith = json["zenith"].as_f64().unwrap();
    let azimuth = json["azimuth"].as_f64().unwrap();
    assert!((zenith - 50.111622).abs() < 1e-4, "zenith {}", zenith);
    assert!((azimuth - 194.340241).abs() < 1e-4, "azimuth {}", azimuth);
}

#[test]
fn position_rejects_out_of_range_latitude() {
    heliotime()
        .args(["position", "--lat", "91", "--lon", "0", "--at", "2025-09-01T12:00:00Z"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_input"));
}

// ── config ───────────────────────────────────────────────────────────────────

#[test]
fn config_prints_defaults() {
    let output = heliotime().arg("config").output().unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["environment"], "dev");
    assert_eq!(json["max_range_days"], 366);
    assert_eq!(json["cache_ttl_seconds"], 7_776_000);
    assert_eq!(json["crosscheck"]["provider"], "open-meteo");
    assert_eq!(json["crosscheck"]["tolerance_seconds"], 120);
}

#[test]
fn config_file_is_overridden_by_environment() {
    let output = heliotime()
        .env("DEV_CROSSCHECK_ENFORCE", "true")
        .env("DEV_CROSSCHECK_TOLERANCE_SECONDS", "30")
        .args(["--config", CONFIG_FIXTURE, "config"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["environment"], "prod");
    assert_eq!(json["max_range_days"], 31);
    assert_eq!(json["default_atmosphere"]["pressure_hpa"], 1000.0);
    assert_eq!(json["crosscheck"]["provider"], "sunrise-sunset");
    assert_eq!(json["crosscheck"]["tolerance_seconds"], 30);
    assert_eq!(json["crosscheck"]["enforce"], true);
}

#[test]
fn missing_config_file_fails() {
    heliotime()
        .args(["--config", "/nonexistent/heliotime.json", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cli_error"));
}

#[test]
fn help_lists_subcommands() {
    heliotime()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sun"))
        .stdout(predicate::str::contains("position"));
}
