//! Black-box tests of the `claw-bootstrap` binary.
//!
//! Only paths that stop before the pipeline starts are exercised here, so no
//! test installs software or touches the network.

use std::process::{Command, Output};

fn bootstrap() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_claw-bootstrap"));
    command.env_remove("RUST_LOG");
    command
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn help_describes_stages_and_config() {
    let output = bootstrap().arg("--help").output().expect("run --help");
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("claw-bootstrap"));
    assert!(text.contains("CLAW_BOOTSTRAP_CONFIG"));
    assert!(text.contains("workspace"));
}

#[test]
fn version_prints_package_version() {
    let output = bootstrap().arg("--version").output().expect("run --version");
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("claw-bootstrap {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn unknown_flags_are_rejected() {
    let output = bootstrap().arg("--force").output().expect("run --force");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--force"));
}

#[test]
fn malformed_config_is_fatal_before_any_stage() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("config.json");
    std::fs::write(&config, "{ \"schema_version\": ").expect("write config");

    let output = bootstrap()
        .env("CLAW_BOOTSTRAP_CONFIG", &config)
        .output()
        .expect("run bootstrap");
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("parse config JSON"), "stderr: {err}");
    assert!(!err.contains("==> Platform"));
}

#[test]
fn unsupported_schema_version_is_fatal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("config.json");
    std::fs::write(&config, r#"{"schema_version": 99}"#).expect("write config");

    let output = bootstrap()
        .env("CLAW_BOOTSTRAP_CONFIG", &config)
        .output()
        .expect("run bootstrap");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unsupported config schema_version 99"));
}
