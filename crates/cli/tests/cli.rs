//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `drover` binary and verify exit codes,
//! stdout and stderr. Every test points `--config` at a temporary file so
//! nothing under the real home directory is read or written.

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A config whose server refuses connections and whose credentials file
/// lives inside `dir`.
fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    let config = format!(
        "[cloud]\ngraphql = \"http://127.0.0.1:9/graphql\"\ncredentials_path = {:?}\n",
        dir.join("auth_token").display().to_string()
    );
    std::fs::write(&path, config).unwrap();
    path
}

/// Helper: the `drover` binary with an isolated config and no token in the
/// environment.
fn drover(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("drover");
    cmd.arg("--config")
        .arg(write_config(dir.path()))
        .env_remove("DROVER_AUTH_TOKEN")
        .env_remove("DROVER_GRAPHQL_SERVER")
        .env_remove("DROVER_LOG");
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("drover workflow client"));
}

#[test]
fn version_exits_0() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("drover"));
}

// ──────────────────────────────────────────────
// 2. Schema registry
// ──────────────────────────────────────────────

#[test]
fn schema_versions_lists_every_generation() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .args(["schema", "versions", "drover.engine.state.Scheduled"])
        .assert()
        .success()
        .stdout(predicate::eq("0.2.0\n0.3.0\n"));
}

#[test]
fn schema_versions_json_output() {
    let dir = TempDir::new().unwrap();
    let output = drover(&dir)
        .args(["--output", "json", "schema", "versions", "drover.core.flow.Flow"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["identity"], "drover.core.flow.Flow");
    assert_eq!(json["versions"], serde_json::json!(["0.3.0"]));
}

#[test]
fn schema_versions_unknown_identity_fails() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .args(["schema", "versions", "no.such.Schema"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unregistered versioned schema"));
}

#[test]
fn schema_list_includes_state_kinds() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .args(["schema", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("drover.engine.state.Retrying"))
        .stdout(predicate::str::contains("drover.core.task.Task"));
}

// ──────────────────────────────────────────────
// 3. Configuration and auth failures
// ──────────────────────────────────────────────

#[test]
fn unparsable_config_fails() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[cloud\n").unwrap();
    cargo_bin_cmd!("drover")
        .arg("--config")
        .arg(&bad)
        .args(["schema", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not parse"));
}

#[test]
fn missing_token_is_reported() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .args(["run", "info", "fr-1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("authorization error"));
}

#[test]
fn errors_are_json_with_json_output() {
    let dir = TempDir::new().unwrap();
    let output = drover(&dir)
        .args(["--output", "json", "heartbeat", "fr-1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    let last = stderr.lines().last().unwrap();
    let json: serde_json::Value = serde_json::from_str(last).unwrap();
    assert!(json["error"].as_str().unwrap().contains("login()"));
}

#[test]
fn quiet_suppresses_error_text() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .args(["--quiet", "secret", "set", "db", "hunter2"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("authorization error").not());
}

#[test]
fn logout_without_stored_token_succeeds() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("auth_token"), "stale").unwrap();
    drover(&dir)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("logged out"));
    assert!(!dir.path().join("auth_token").exists());

    drover(&dir).arg("logout").assert().success();
}

// ──────────────────────────────────────────────
// 4. Local input validation
// ──────────────────────────────────────────────

#[test]
fn deploy_rejects_invalid_flow_payload() {
    let dir = TempDir::new().unwrap();
    let flow = dir.path().join("flow.json");
    std::fs::write(
        &flow,
        r#"{"tasks": [{"name": "extract"}], "__version__": "0.3.0"}"#,
    )
    .unwrap();
    drover(&dir)
        .arg("deploy")
        .arg(&flow)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid flow"))
        .stderr(predicate::str::contains("name: Missing data for required field."))
        .stderr(predicate::str::contains("tasks.0.slug"));
}

#[test]
fn deploy_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .args(["deploy", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading file"));
}

#[test]
fn run_create_requires_object_parameters() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .args(["run", "create", "f-1", "--parameters", "[1, 2]"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be a JSON object"));
}

#[test]
fn run_create_rejects_bad_start_time() {
    let dir = TempDir::new().unwrap();
    drover(&dir)
        .args(["run", "create", "f-1", "--start-time", "tomorrow"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --start-time"));
}

#[test]
fn set_state_rejects_unknown_state_kind() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    std::fs::write(&state, r#"{"type": "Cancelled", "__version__": "0.3.0"}"#).unwrap();
    drover(&dir)
        .args(["run", "set-state", "fr-1", "--version", "1", "--state"])
        .arg(&state)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid state"));
}
