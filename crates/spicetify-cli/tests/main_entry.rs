//! Integration tests for the `spicetify` binary entry point.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn config_command_prints_the_file_values() {
    let dir = TempDir::new().expect("temp dir");
    let config_file = dir.path().join("config.toml");
    std::fs::write(&config_file, "daemon_addr = \"127.0.0.1:9999\"\n").expect("config");

    let mut command = cargo_bin_cmd!("spicetify");
    command
        .arg("--config-path")
        .arg(&config_file)
        .args(["--log-format", "compact", "config"]);
    command
        .assert()
        .success()
        .stdout(contains("daemon_addr = \"127.0.0.1:9999\""));
}

#[test]
fn missing_pkg_action_exits_with_failure() {
    let mut command = cargo_bin_cmd!("spicetify");
    command.arg("pkg");
    command.assert().failure().stderr(contains("Usage"));
}
