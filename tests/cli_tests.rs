//! Command-line behavior of the `pst` binary
//!
//! End-to-end runs use `direct` proxies so every request goes straight to a
//! local mock speed server.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::{fs, path::Path, process::Command};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `pst` running in `dir` with no PST_* variables inherited
fn pst(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pst").unwrap();
    cmd.current_dir(dir);
    for (key, _) in std::env::vars() {
        if key.starts_with("PST_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

const DIRECT_CONFIG: &str = r#"
proxies:
  - { name: "Direct A", type: direct }
  - { name: "Direct B", type: direct }
  - { name: "Blocked C", type: direct }
"#;

async fn speed_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/__down"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

#[test]
fn test_help_lists_core_options() {
    let dir = TempDir::new().unwrap();
    pst(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--fast"))
        .stdout(predicate::str::contains("--stash-compatible"))
        .stdout(predicate::str::contains("--results-file"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    pst(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_config_source_is_config_error() {
    let dir = TempDir::new().unwrap();
    pst(dir.path())
        .arg("--no-color")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CONFIG"));
}

#[test]
fn test_invalid_duration_is_rejected_by_parser() {
    let dir = TempDir::new().unwrap();
    pst(dir.path())
        .args(["-c", "clash.yaml", "--timeout", "0s"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--timeout"));
}

#[test]
fn test_rename_requires_output() {
    let dir = TempDir::new().unwrap();
    pst(dir.path())
        .args(["-c", "clash.yaml", "--rename", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--output"));
}

#[test]
fn test_unreadable_config_file_fails() {
    let dir = TempDir::new().unwrap();
    pst(dir.path())
        .args(["-c", "does-not-exist.yaml", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does-not-exist.yaml"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fast_run_writes_results_and_output() {
    let server = speed_server().await;
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("clash.yaml"), DIRECT_CONFIG).unwrap();

    pst(dir.path())
        .args(["-c", "clash.yaml", "--fast", "--no-color", "-b", "blocked"])
        .args(["--server-url", &server.uri()])
        .args(["--probe-count", "2", "--timeout", "2s"])
        .args(["--results-file", "results.json", "-o", "out/fast.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Direct A"))
        .stdout(predicate::str::contains("Direct B"))
        .stdout(predicate::str::contains("Blocked C").not())
        .stderr(predicate::str::contains("Testing 2 proxies"));

    let saved = fs::read_to_string(dir.path().join("results.json")).unwrap();
    let saved: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved.as_array().unwrap().len(), 2);

    let output = fs::read_to_string(dir.path().join("out/fast.yaml")).unwrap();
    let output: serde_yaml::Value = serde_yaml::from_str(&output).unwrap();
    assert_eq!(output["proxies"].as_sequence().unwrap().len(), 2);
    assert_eq!(output["proxy-groups"][0]["name"], "Auto Select");
    assert_eq!(output["rules"][0], "MATCH,Auto Select");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_run_skips_tested_proxies() {
    let server = speed_server().await;
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("clash.yaml"), DIRECT_CONFIG).unwrap();

    let run = || {
        pst(dir.path())
            .args(["-c", "clash.yaml", "--fast", "--no-color"])
            .args(["--server-url", &server.uri()])
            .args(["--probe-count", "1", "--results-file", "results.json"])
            .assert()
            .success()
    };

    run();
    let first_requests = server.received_requests().await.unwrap().len();
    assert_eq!(first_requests, 3);

    run().stderr(predicate::str::contains("No new proxies to test"));
    assert_eq!(server.received_requests().await.unwrap().len(), first_requests);
}
