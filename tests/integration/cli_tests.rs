//! Tests that drive the `primecache` binary

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary isolated to a temp data dir with no config file
fn primecache(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("primecache");
    cmd.arg("--data-dir")
        .arg(temp.path().join("data"))
        .arg("--config")
        .arg(temp.path().join("missing.toml"))
        .env_remove("RUST_LOG");
    cmd
}

fn submit(temp: &TempDir, n: &str) -> String {
    let output = primecache(temp)
        .args(["submit", n, "--format", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

#[test]
fn help_displays() {
    cargo_bin_cmd!("primecache")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("primes"))
        .stdout(predicate::str::contains("worker"));
}

#[test]
fn version_displays() {
    cargo_bin_cmd!("primecache")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("primecache"));
}

#[test]
fn submit_zero_fails() {
    let temp = TempDir::new().unwrap();
    primecache(&temp)
        .args(["submit", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid prime count 0"))
        .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn submit_negative_fails() {
    let temp = TempDir::new().unwrap();
    primecache(&temp)
        .args(["submit", "-5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("-5"));

    primecache(&temp)
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn submit_drain_status() {
    let temp = TempDir::new().unwrap();
    let id = submit(&temp, "10");
    assert_eq!(id.len(), 32);

    primecache(&temp)
        .args(["status", &id, "--format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pending"));

    primecache(&temp)
        .args(["worker", "--drain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 done"));

    primecache(&temp)
        .args(["status", &id, "--format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::diff("2 3 5 7 11 13 17 19 23 29\n"));

    primecache(&temp)
        .args(["status", &id, "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"done\""));
}

#[test]
fn cache_show_after_work() {
    let temp = TempDir::new().unwrap();
    submit(&temp, "6");
    primecache(&temp).args(["worker", "--drain"]).assert().success();

    primecache(&temp)
        .args(["cache", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[2,3,5,7,11,13]\n"));

    primecache(&temp)
        .args(["cache", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("13"));
}

#[test]
fn list_shows_requests() {
    let temp = TempDir::new().unwrap();
    let id = submit(&temp, "3");

    primecache(&temp)
        .args(["list", "--format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{} pending 3", id)));

    primecache(&temp)
        .args(["list", "--status", "done", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn status_unknown_id() {
    let temp = TempDir::new().unwrap();
    primecache(&temp)
        .args(["status", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Request not found"));
}

#[test]
fn wait_times_out_without_worker() {
    let temp = TempDir::new().unwrap();
    primecache(&temp)
        .args(["submit", "5", "--wait", "--timeout", "0", "--format", "plain"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("still pending"));
}

#[test]
fn config_path() {
    let temp = TempDir::new().unwrap();
    primecache(&temp)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("missing.toml"));
}

#[test]
fn config_show() {
    let temp = TempDir::new().unwrap();
    primecache(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[cache]"))
        .stdout(predicate::str::contains("checkpoint_interval = 100"));
}

#[test]
fn config_init_writes_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("conf").join("config.toml");

    cargo_bin_cmd!("primecache")
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());
}
