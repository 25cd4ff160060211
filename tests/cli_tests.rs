//! Integration tests for the CLI interface
//!
//! Tests argument parsing of the main entry point

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("magi-relay").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--worker-command"))
        .stdout(predicate::str::contains("--process-timeout-ms"));
}

#[test]
fn test_cli_rejects_unknown_flag() {
    let mut cmd = Command::cargo_bin("magi-relay").unwrap();
    cmd.arg("--definitely-not-a-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn test_cli_rejects_malformed_port() {
    let mut cmd = Command::cargo_bin("magi-relay").unwrap();
    cmd.args(["--port", "not-a-port"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
