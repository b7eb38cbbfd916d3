//! Integration tests for `parca-operator render`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DEFAULT_COMMAND_LINE: &str = "/usr/bin/parca --config-path=/etc/parca/parca.yaml \
     --storage-in-memory=true --storage-active-memory=4294967296";

fn operator(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("parca-operator"));
    cmd.env("PARCA_OPERATOR_CONFIG", dir.path().join("config.yaml"))
        .env("PARCA_OPERATOR_STATE", dir.path().join("state.json"))
        .env("NO_COLOR", "1");
    cmd
}

/// A temp dir holding `config.yaml` with `content`.
fn with_config(content: &str) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("config.yaml"), content).expect("write config");
    dir
}

#[test]
fn test_render_defaults() {
    let dir = TempDir::new().expect("temp dir");
    operator(&dir)
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("# {DEFAULT_COMMAND_LINE}")))
        .stdout(predicate::str::contains("type: FILESYSTEM"))
        .stdout(predicate::str::contains("directory: /var/lib/parca"))
        .stdout(predicate::str::contains("job_name: juju-introspect"));
}

#[test]
fn test_render_json() {
    let dir = TempDir::new().expect("temp dir");
    let output = operator(&dir)
        .args(["render", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["command_line"], DEFAULT_COMMAND_LINE);
    assert_eq!(value["config"]["object_storage"]["bucket"]["type"], "FILESYSTEM");
    assert_eq!(
        value["config"]["scrape_configs"][0]["static_configs"][0]["targets"][0],
        "127.0.0.1:6000"
    );
}

#[test]
fn test_render_persistent_storage() {
    let dir = with_config("enable-persistence: true\n");
    operator(&dir)
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "--storage-in-memory=false --storage-persist --storage-path=/var/lib/parca",
        ))
        .stdout(predicate::str::contains("--storage-active-memory").not());
}

#[test]
fn test_render_memory_limit_and_interval() {
    let dir = with_config("memory-storage-limit: 1024\njuju-scrape-interval: 30\n");
    operator(&dir)
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains("--storage-active-memory=1073741824"))
        .stdout(predicate::str::contains("scrape_interval: 30s"));
}

#[test]
fn test_render_custom_paths() {
    let dir = with_config(
        "paths:\n  bin: /opt/parca/bin/parca\n  config: /opt/parca/etc/parca.yaml\n",
    );
    operator(&dir)
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "# /opt/parca/bin/parca --config-path=/opt/parca/etc/parca.yaml",
        ));
}

#[test]
fn test_render_rejects_legacy_storage_key() {
    let dir = with_config("storage-persist: true\n");
    operator(&dir)
        .arg("render")
        .assert()
        .failure()
        .stderr(predicate::str::contains("rename it to 'enable-persistence'"));
}

#[test]
fn test_render_rejects_mixed_storage_keys_as_json() {
    let dir = with_config("storage-persist: true\nenable-persistence: true\n");
    let output = operator(&dir)
        .args(["render", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "contract_violation");
}

#[test]
fn test_render_rejects_zero_memory_limit() {
    let dir = with_config("memory-storage-limit: 0\n");
    operator(&dir)
        .arg("render")
        .assert()
        .failure()
        .stderr(predicate::str::contains("greater than zero"));
}

#[test]
fn test_render_malformed_config_fails() {
    let dir = with_config("memory-storage-limit: [1, 2]\n");
    operator(&dir)
        .arg("render")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse"));
}

#[test]
fn test_render_uses_persisted_store_inputs() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("state.json"),
        r#"{
            "phase": "running",
            "status": {"kind": "active"},
            "inputs": {"store": {"remote-store-address": "grpc.parca.cloud:443"}}
        }"#,
    )
    .unwrap();
    operator(&dir)
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "--store-address=grpc.parca.cloud:443 --mode=scraper-only",
        ));
}

#[test]
fn test_render_accepts_binary_section() {
    for binary in [
        "binary:\n  resource: /var/lib/juju/agents/unit-parca-0/resources/parca\n",
        "binary:\n  release:\n    url: https://example.com/parca.tar.gz\n    sha256: abc123\n",
    ] {
        let dir = with_config(binary);
        operator(&dir)
            .arg("render")
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("# {DEFAULT_COMMAND_LINE}")));
    }
}
