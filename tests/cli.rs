use assert_cmd::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("crates/signal-layers/tests/fixtures")
        .join(name)
}

/// Writes `yaml` to a fresh config file so the user's own config is never
/// picked up.
fn config_file(yaml: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dropwatch.yaml");
    std::fs::write(&path, yaml).unwrap();
    (dir, path)
}

fn dropwatch(config: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("dropwatch").unwrap();
    cmd.env_remove("DROPWATCH_TARGET_URL")
        .env_remove("DROPWATCH_WEBHOOK_URL")
        .env_remove("RUST_LOG")
        .args(["--metrics-port", "0", "--config"])
        .arg(config);
    cmd
}

fn stdout_json(cmd: &mut Command) -> Value {
    let assert = cmd.assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    serde_json::from_str(&stdout).expect("valid json")
}

#[test]
fn layers_lists_enabled_layers_in_order() {
    let (_dir, config) = config_file("layers:\n  enabled: [status-text, structured-metadata]\n");
    let value = stdout_json(dropwatch(&config).args(["--output", "json", "layers"]));

    let rows = value.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"].as_str(), Some("status-text"));
    assert_eq!(rows[1]["id"].as_str(), Some("structured-metadata"));
}

#[test]
fn check_with_any_positive_finds_metadata_offer() {
    let (_dir, config) = config_file("{}\n");
    let page = fixture("metadata_only.html");
    let value = stdout_json(
        dropwatch(&config)
            .args(["--output", "json", "check", "--rule", "any-positive"])
            .arg(&page),
    );

    assert_eq!(value["found"].as_bool(), Some(true));
    assert_eq!(value["details"]["offers"][0]["price"].as_str(), Some("45.00"));
}

#[test]
fn check_with_default_rule_defers_to_status_text() {
    let (_dir, config) = config_file("{}\n");
    let page = fixture("metadata_only.html");
    let value = stdout_json(dropwatch(&config).args(["--output", "json", "check"]).arg(&page));

    assert_eq!(value["found"].as_bool(), Some(false));
    assert!(!value["verdicts"].as_array().unwrap().is_empty());
}

#[test]
fn check_human_output_previews_the_alert() {
    let (_dir, config) = config_file("{}\n");
    let page = fixture("metadata_only.html");
    let assert = dropwatch(&config)
        .args(["check", "--rule", "any-positive", "--url", "https://example.com/event/1"])
        .arg(&page)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("FOUND via any-positive"));
    assert!(stdout.contains("Tickets Available!"));
    assert!(stdout.contains("https://example.com/event/1"));
}

#[test]
fn check_rejects_rule_for_disabled_layer() {
    let (_dir, config) = config_file("layers:\n  enabled: [status-text]\n");
    dropwatch(&config)
        .args(["check", "--rule", "authoritative:seat-listing"])
        .arg(fixture("sold_out.html"))
        .assert()
        .failure();
}

#[test]
fn watch_without_targets_fails_fast() {
    let (_dir, config) = config_file("targets: []\n");
    let assert = dropwatch(&config).args(["watch", "--dry-run"]).assert().failure();

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("no targets"), "stderr was: {stderr}");
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");
    dropwatch(&missing).arg("layers").assert().failure();
}
