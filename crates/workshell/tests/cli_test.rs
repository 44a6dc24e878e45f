//! Integration tests for the `workshell` CLI binary.
//!
//! Every test runs against a throwaway HOME; API calls go to a local
//! wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// A temp HOME with the SSH config and key paths tests point at.
struct Sandbox {
    home: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            home: tempfile::tempdir().unwrap(),
        }
    }

    fn ssh_config(&self) -> PathBuf {
        self.home.path().join(".ssh").join("config")
    }

    fn key(&self) -> PathBuf {
        self.home.path().join(".workshell").join("workshell.pem")
    }

    fn write_ssh_config(&self, text: &str) {
        std::fs::create_dir_all(self.ssh_config().parent().unwrap()).unwrap();
        std::fs::write(self.ssh_config(), text).unwrap();
    }

    fn read_ssh_config(&self) -> String {
        std::fs::read_to_string(self.ssh_config()).unwrap()
    }

    fn write_workspaces(&self, ids: &[&str]) -> PathBuf {
        let path = self.home.path().join("active.json");
        let entries: Vec<_> = ids.iter().map(|id| json!({ "identifier": id })).collect();
        std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();
        path
    }

    /// `workshell` with env isolation.
    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("workshell");
        cmd.env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.home.path().join(".config"))
            .env_remove("RUST_LOG")
            .env_remove("WORKSHELL_PROFILE")
            .env_remove("WORKSHELL_API_URL")
            .env_remove("WORKSHELL_TOKEN")
            .env_remove("WORKSHELL_ORG")
            .env_remove("WORKSHELL_SSH_CONFIG")
            .env_remove("WORKSHELL_KEY_PATH")
            .env_remove("WORKSHELL_OUTPUT")
            .env_remove("WORKSHELL_TIMEOUT");
        cmd
    }

    fn managed_entry(&self, host: &str, port: u16) -> String {
        format!(
            "Host {host}\n\t Hostname 0.0.0.0\n\t IdentityFile {}\n\t User brev\n\t Port {port}\n",
            self.key().display()
        )
    }
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

async fn mock_api() -> MockServer {
    let server = MockServer::start().await;
    let get = |route: &str, body: serde_json::Value| {
        Mock::given(method("GET"))
            .and(path(route.to_owned()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
    };

    get("/api/me", json!({ "id": "u-1", "username": "ada" }))
        .mount(&server)
        .await;
    get("/api/organizations", json!([{ "id": "org-1", "name": "Lab" }]))
        .mount(&server)
        .await;
    get(
        "/api/organizations/org-1/workspaces",
        json!([
            { "id": "w1", "name": "alpha", "createdByUserId": "u-1", "dns": "alpha-lab.example.dev", "status": "RUNNING" },
            { "id": "w2", "name": "beta", "createdByUserId": "u-9", "dns": "beta-lab.example.dev", "status": "RUNNING" },
            { "id": "w3", "name": "gamma", "createdByUserId": "u-1", "dns": "gamma-lab.example.dev", "status": "STOPPED" }
        ]),
    )
    .mount(&server)
    .await;
    get(
        "/api/me/keys",
        json!({ "privateKey": "-----BEGIN TEST KEY-----\n", "publicKey": "ssh-ed25519 AAA" }),
    )
    .mount(&server)
    .await;
    server
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = Sandbox::new().cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    Sandbox::new().cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("sync")
            .and(predicate::str::contains("hosts"))
            .and(predicate::str::contains("workspaces"))
            .and(predicate::str::contains("orgs"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    Sandbox::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("workshell"));
}

#[test]
fn test_completions_zsh() {
    Sandbox::new()
        .cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_offline_and_from_file_conflict() {
    let output = Sandbox::new()
        .cmd()
        .args(["sync", "--offline", "--from-file", "x.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_config_show_without_file() {
    Sandbox::new()
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port_base = 2222"));
}

// ── sync --from-file ────────────────────────────────────────────────

#[test]
fn test_sync_from_file_adds_entries() {
    let sb = Sandbox::new();
    let active = sb.write_workspaces(&["ws-1", "ws-2"]);

    sb.cmd()
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .args(["--key-path", arg(&sb.key())])
        .args(["-o", "plain", "sync", "--from-file", arg(&active)])
        .assert()
        .success()
        .stdout("ws-1\t2222\nws-2\t2223\n")
        .stderr(predicate::str::contains("+ ws-1"));

    assert_eq!(
        sb.read_ssh_config(),
        format!("{}\n{}", sb.managed_entry("ws-1", 2222), sb.managed_entry("ws-2", 2223))
    );
}

#[test]
fn test_sync_twice_leaves_file_unchanged() {
    let sb = Sandbox::new();
    let active = sb.write_workspaces(&["ws-1", "ws-2"]);
    let run = || {
        sb.cmd()
            .args(["--ssh-config", arg(&sb.ssh_config())])
            .args(["--key-path", arg(&sb.key())])
            .args(["-q", "sync", "--from-file", arg(&active)])
            .assert()
            .success();
    };

    run();
    let first = sb.read_ssh_config();
    run();
    assert_eq!(sb.read_ssh_config(), first);
}

#[test]
fn test_sync_prunes_stale_and_keeps_foreign() {
    let sb = Sandbox::new();
    let foreign = "Host myserver\n    HostName 10.0.0.5\n    User admin\n\n";
    sb.write_ssh_config(&format!("{foreign}{}", sb.managed_entry("old-ws", 2222)));
    let active = sb.write_workspaces(&["new-ws"]);

    sb.cmd()
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .args(["--key-path", arg(&sb.key())])
        .args(["-o", "plain", "sync", "--backup", "--from-file", arg(&active)])
        .assert()
        .success()
        .stdout("new-ws\t2223\n")
        .stderr(predicate::str::contains("- old-ws").and(predicate::str::contains("Backup")));

    assert_eq!(
        sb.read_ssh_config(),
        format!("{foreign}{}", sb.managed_entry("new-ws", 2223))
    );
    let backups = std::fs::read_dir(sb.home.path().join(".workshell"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("config.bak."))
        .count();
    assert_eq!(backups, 1);
}

#[test]
fn test_unparseable_ssh_config_exits_9() {
    let sb = Sandbox::new();
    sb.write_ssh_config("Host\n  User nobody\n");
    let active = sb.write_workspaces(&["ws-1"]);

    let output = sb
        .cmd()
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .args(["sync", "--from-file", arg(&active)])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(9));
    assert!(combined_output(&output).contains("Cannot parse SSH config"));
    assert_eq!(sb.read_ssh_config(), "Host\n  User nobody\n");
}

#[test]
fn test_offline_sync_without_cache_fails() {
    let sb = Sandbox::new();
    let output = sb
        .cmd()
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .args(["sync", "--offline"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Workspace list unavailable"));
}

// ── hosts ───────────────────────────────────────────────────────────

#[test]
fn test_hosts_lists_managed_entries_only() {
    let sb = Sandbox::new();
    sb.write_ssh_config(&format!(
        "Host mine\n  User me\n\n{}",
        sb.managed_entry("ws-9", 2230)
    ));

    let output = sb
        .cmd()
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .args(["--key-path", arg(&sb.key())])
        .args(["-o", "json-compact", "hosts"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let hosts: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(hosts, json!([{ "host": "ws-9", "port": 2230 }]));
}

#[test]
fn test_hosts_without_config_file() {
    let sb = Sandbox::new();
    sb.cmd()
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .arg("hosts")
        .assert()
        .success()
        .stderr(predicate::str::contains("No workspace entries"));
    assert!(!sb.ssh_config().exists());
}

// ── Online ──────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_online_sync_writes_key_cache_and_entries() {
    let server = mock_api().await;
    let sb = Sandbox::new();

    sb.cmd()
        .args(["--api-url", &server.uri(), "--token", "tok"])
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .args(["-o", "plain", "sync"])
        .assert()
        .success()
        .stdout("alpha-lab.example.dev\t2222\ngamma-lab.example.dev\t2223\n");

    let key = std::fs::read_to_string(sb.key()).unwrap();
    assert_eq!(key, "-----BEGIN TEST KEY-----\n");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(sb.key()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
    assert!(!sb.read_ssh_config().contains("beta-lab"));

    // The refreshed cache drives an offline pass.
    sb.cmd()
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .args(["-o", "plain", "sync", "--offline"])
        .assert()
        .success()
        .stdout("alpha-lab.example.dev\t2222\ngamma-lab.example.dev\t2223\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_workspaces_shows_configured_ports() {
    let server = mock_api().await;
    let sb = Sandbox::new();
    sb.write_ssh_config(&sb.managed_entry("gamma-lab.example.dev", 2240));

    let output = sb
        .cmd()
        .args(["--api-url", &server.uri(), "--token", "tok"])
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .args(["-o", "json", "ls"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let views: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(views.as_array().unwrap().len(), 2);
    assert_eq!(views[0]["name"], "alpha");
    assert_eq!(views[0]["port"], serde_json::Value::Null);
    assert_eq!(views[1]["name"], "gamma");
    assert_eq!(views[1]["port"], 2240);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_orgs_lists_organizations() {
    let server = mock_api().await;
    let sb = Sandbox::new();

    sb.cmd()
        .args(["--api-url", &server.uri(), "--token", "tok"])
        .args(["-o", "plain", "orgs"])
        .assert()
        .success()
        .stdout("org-1\n");

    let output = sb
        .cmd()
        .args(["--api-url", &server.uri(), "--token", "tok"])
        .args(["-o", "json-compact", "orgs"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let orgs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(orgs, json!([{ "id": "org-1", "name": "Lab" }]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_token_exits_3() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let sb = Sandbox::new();

    let output = sb
        .cmd()
        .args(["--api-url", &server.uri(), "--token", "bad", "--org", "org-1"])
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .arg("sync")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(!sb.ssh_config().exists());
}

#[test]
fn test_online_sync_without_token_exits_3() {
    let sb = Sandbox::new();
    let output = sb
        .cmd()
        .args(["--api-url", "http://127.0.0.1:9"])
        .args(["--ssh-config", arg(&sb.ssh_config())])
        .arg("sync")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("No API token"));
}
