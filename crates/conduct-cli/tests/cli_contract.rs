#![allow(deprecated)]
//! Binary contract: exit codes and operator-facing output.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUNDLE_ID: &str = "45e0c477d3e5ea92aa8d85c0d8f3e25c";

/// `conduct` isolated from the caller's environment and home directory.
fn conduct(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("conduct").unwrap();
    for var in [
        "CONDUCTR_SCHEME",
        "CONDUCTR_HOST",
        "CONDUCTR_PORT",
        "CONDUCTR_API_VERSION",
        "CONDUCTR_TIMEOUT",
        "CONDUCTR_RESOLVE_CACHE_DIR",
        "CONDUCTR_SETTINGS",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.arg("--settings")
        .arg(home.path().join("settings.yaml"))
        .arg("--resolve-cache-dir")
        .arg(home.path().join("cache"));
    cmd
}

fn mock_port(server: &MockServer) -> String {
    server.address().port().to_string()
}

#[test]
fn unresolvable_bundle_exits_with_failure() {
    let home = TempDir::new().unwrap();
    conduct(&home)
        .args(["load", "/definitely/not/here/visualizer.zip"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unable to resolve bundle"));
}

#[test]
fn malformed_bundle_exits_with_failure() {
    let home = TempDir::new().unwrap();
    let bundle = home.path().join("broken.zip");
    std::fs::write(&bundle, b"not a zip archive").unwrap();

    conduct(&home)
        .arg("load")
        .arg(&bundle)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is malformed"));
}

#[test]
fn invalid_settings_exits_with_failure() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("settings.yaml"), "resolvers: [carrier-pigeon]\n").unwrap();

    conduct(&home)
        .args(["load", "visualizer"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn unreachable_cluster_exits_with_connection_code() {
    let home = TempDir::new().unwrap();
    conduct(&home)
        .args(["unload", BUNDLE_ID, "--port", "1"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Unable to contact ConductR"));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_waits_for_scale_and_prints_hint() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("/v2/bundles/{}", BUNDLE_ID)))
        .and(query_param("scale", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "bundleId": BUNDLE_ID })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/bundles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "bundleId": BUNDLE_ID,
            "bundleExecutions": [{ "isStarted": true }, { "isStarted": true }]
        }])))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let port = mock_port(&server);
    conduct(&home)
        .args(["run", BUNDLE_ID, "--scale", "2", "--port", &port])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Stop bundle with: conduct stop --port {} 45e0c47",
            port
        )));
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_times_out_with_timeout_code() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("/v2/bundles/{}", BUNDLE_ID)))
        .and(query_param("scale", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "bundleId": BUNDLE_ID })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/bundles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "bundleId": BUNDLE_ID,
            "bundleExecutions": [{ "isStarted": true }]
        }])))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    conduct(&home)
        .args([
            "stop",
            BUNDLE_ID,
            "--port",
            &mock_port(&server),
            "--wait-timeout",
            "1",
            "--poll-interval",
            "1",
        ])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Timed out"));
}

#[tokio::test(flavor = "multi_thread")]
async fn logs_prints_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/bundles/abc/logs"))
        .and(query_param("count", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "timestamp": "2015-08-24T01:16:22.327Z", "host": "10.0.1.232", "message": "[WARN] low disk" }
        ])))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    conduct(&home)
        .args(["logs", "abc", "-n", "1", "--utc", "--port", &mock_port(&server)])
        .assert()
        .success()
        .stdout(predicate::str::contains("TIME       HOST        LOG"))
        .stdout(predicate::str::contains("01:16:22Z  10.0.1.232  [WARN] low disk"));
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_prints_events_until_closed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/bundles/events"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(
                    "event: bundleInstallationAdded\ndata: 45e0c47\n\n\n\ndata: ping\n\n",
                ),
        )
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    conduct(&home)
        .args(["watch", "--port", &mock_port(&server)])
        .assert()
        .success()
        .stdout(predicate::str::contains("bundleInstallationAdded: 45e0c47"))
        .stdout(predicate::str::contains("ping").not());
}
