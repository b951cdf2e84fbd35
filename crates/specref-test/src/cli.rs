//! CLI regression tests for the `specref` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in flag
//! names, exit codes and output formats.
//!
//! Run with: `cargo test -p specref-test`
//! Requires the `specref` binary to be built first (`cargo build -p specref`).

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::TempDir;

use crate::server::fixtures;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns an assert_cmd Command wrapping the `specref` binary.
fn specref() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("specref")
        .expect("specref binary not found (run `cargo build -p specref` first)");
    cmd.env_remove("RUST_LOG")
        .env_remove("SPECREF_LOG_LEVEL")
        .env_remove("SPECREF_LOG_FORMAT");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let s = String::from_utf8(output.stdout.clone()).expect("stdout should be valid UTF-8");
    serde_json::from_str(&s).expect("stdout should be valid JSON")
}

// ---------------------------------------------------------------------------
// specref resolve
// ---------------------------------------------------------------------------

#[test]
fn resolve_imports_relative_models() {
    let output = specref()
        .args(["resolve", "--spec"])
        .arg(fixtures().join("petstore.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert_eq!(v["definitions"]["Pet"]["type"], "object");
    assert_eq!(v["definitions"]["Category"]["properties"]["id"]["format"], "int64");
    assert_eq!(
        v["paths"]["/pets"]["get"]["responses"]["200"]["schema"]["items"]["$ref"],
        "#/definitions/Pet"
    );
    assert!(v["paths"]["/pets/{id}"]["get"].is_object());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("models.yaml"));
}

#[test]
fn resolve_inlines_local_references() {
    let output = specref()
        .args(["resolve", "--spec"])
        .arg(fixtures().join("local-only.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    let get = &v["paths"]["/users/{username}"]["get"];
    assert_eq!(get["parameters"][0]["name"], "username");
    assert_eq!(get["responses"]["200"]["schema"]["type"], "object");
}

#[test]
fn resolve_yaml_format() {
    specref()
        .args(["resolve", "--format", "yaml", "--spec"])
        .arg(fixtures().join("local-only.yaml"))
        .assert()
        .success()
        .stdout(contains("swagger:").and(contains("username:")));
}

#[test]
fn resolve_rejects_unknown_format() {
    specref()
        .args(["resolve", "--format", "xml", "--spec"])
        .arg(fixtures().join("local-only.yaml"))
        .assert()
        .failure()
        .code(2);
}

#[test]
fn resolve_writes_output_file() {
    let tmp = TempDir::new().expect("temp dir");
    let out = tmp.path().join("resolved.json");

    specref()
        .args(["resolve", "--spec"])
        .arg(fixtures().join("local-only.yaml"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicates::str::is_empty());

    let written = std::fs::read_to_string(&out).expect("output file");
    let v: serde_json::Value = serde_json::from_str(&written).expect("valid JSON");
    assert_eq!(v["swagger"], "2.0");
}

#[test]
fn resolve_reports_unresolved_but_succeeds() {
    specref()
        .args(["resolve", "--spec"])
        .arg(fixtures().join("broken-ref.yaml"))
        .assert()
        .success()
        .stderr(contains("#/definitions/Missing"));
}

#[test]
fn resolve_strict_fails_on_unresolved() {
    specref()
        .args(["resolve", "--strict", "--spec"])
        .arg(fixtures().join("broken-ref.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("1 unresolved reference(s)"));
}

#[test]
fn resolve_missing_file_exits_one() {
    specref()
        .args(["resolve", "--spec", "this-file-does-not-exist.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("error: failed to read"));
}

#[test]
fn resolve_missing_spec_flag_exits_two() {
    specref().args(["resolve"]).assert().failure().code(2);
}

#[test]
fn resolve_uses_manifest_mirrors() {
    let output = specref()
        .arg("--config")
        .arg(fixtures().join("specref.yaml"))
        .args(["resolve", "--spec"])
        .arg(fixtures().join("mirrored.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert_eq!(
        v["components"]["schemas"]["Error"]["properties"]["message"]["type"],
        "string"
    );
}

#[test]
fn resolve_invalid_manifest_exits_one() {
    specref()
        .arg("--config")
        .arg(fixtures().join("invalid-manifest.yaml"))
        .args(["resolve", "--spec"])
        .arg(fixtures().join("local-only.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("failed to load"));
}

// ---------------------------------------------------------------------------
// specref check
// ---------------------------------------------------------------------------

#[test]
fn check_clean_spec_exits_zero() {
    specref()
        .args(["check", "--spec"])
        .arg(fixtures().join("petstore.yaml"))
        .assert()
        .success()
        .stderr(contains("no unresolved references"));
}

#[test]
fn check_broken_spec_exits_one() {
    specref()
        .args(["check", "--spec"])
        .arg(fixtures().join("broken-ref.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("#/definitions/Missing").and(contains("not found")));
}

#[test]
fn check_json_format_outputs_valid_json() {
    let output = specref()
        .args(["check", "--format", "json", "--spec"])
        .arg(fixtures().join("broken-ref.yaml"))
        .assert()
        .failure()
        .code(1)
        .get_output()
        .clone();

    let v = stdout_json(&output);
    let entry = &v["unresolved"]["#/definitions/Missing"];
    assert_eq!(entry["location"], "/definitions/Missing");
    assert!(entry["root"].as_str().is_some_and(|r| r.starts_with("file://")));
    assert!(v["stats"]["requests"].is_number());
}

#[test]
fn check_deny_plaintext_refuses_http_spec() {
    specref()
        .args(["check", "--deny-plaintext", "--spec", "http://127.0.0.1:9/spec.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("plaintext HTTP not allowed"));
}

#[test]
fn check_mirrored_spec_without_config_reports_fetch_failure() {
    // Without the manifest mirror the remote model cannot be fetched.
    specref()
        .args(["check", "--timeout", "2", "--spec"])
        .arg(fixtures().join("mirrored.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("http://specs.example.com/common/errors.json#/definitions/Error"));
}
