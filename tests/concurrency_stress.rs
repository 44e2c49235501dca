mod support;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin;
use slate::error::Error;
use slate::lock::FileLock;
use tempfile::TempDir;

use support::TestLedger;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(25);
const READY_TIMEOUT: Duration = Duration::from_secs(2);

fn slate_bin() -> PathBuf {
    cargo_bin("slate")
}

fn spawn_add(root: &Path, title: &str) -> std::io::Result<std::process::Child> {
    Command::new(slate_bin())
        .current_dir(root)
        .args(["add", title])
        .spawn()
}

#[test]
fn concurrent_adds_for_one_title_get_distinct_slugs(
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = TestLedger::init()?;
    let writers = 8;

    let mut children = Vec::with_capacity(writers);
    for _ in 0..writers {
        children.push(spawn_add(ledger.path(), "race condition")?);
    }
    for mut child in children {
        let status = child.wait()?;
        assert!(status.success(), "concurrent add failed");
    }

    let output = Command::new(slate_bin())
        .current_dir(ledger.path())
        .args(["list", "--json"])
        .output()?;
    assert!(output.status.success());

    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let slugs: HashSet<String> = envelope["data"]
        .as_array()
        .expect("task array")
        .iter()
        .map(|task| task["slug"].as_str().unwrap().to_string())
        .collect();

    let mut expected = HashSet::new();
    expected.insert("race-condition".to_string());
    for suffix in 2..=writers {
        expected.insert(format!("race-condition-{suffix}"));
    }
    assert_eq!(slugs, expected);

    Ok(())
}

#[test]
fn concurrent_adds_across_bases_stay_unique() -> Result<(), Box<dyn std::error::Error>> {
    let ledger = TestLedger::init()?;

    // "task 2" competes for the bare slug `task-2` with suffix slot 2 of
    // base `task`, so these writers hold different base locks.
    let mut children = Vec::new();
    for title in ["task", "task", "task 2", "task 2", "task", "task 2"] {
        children.push(spawn_add(ledger.path(), title)?);
    }
    for mut child in children {
        let status = child.wait()?;
        assert!(status.success(), "concurrent add failed");
    }

    let output = Command::new(slate_bin())
        .current_dir(ledger.path())
        .args(["list", "--json"])
        .output()?;
    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let slugs: Vec<String> = envelope["data"]
        .as_array()
        .expect("task array")
        .iter()
        .map(|task| task["slug"].as_str().unwrap().to_string())
        .collect();

    let unique: HashSet<&String> = slugs.iter().collect();
    assert_eq!(unique.len(), slugs.len(), "duplicate slug issued: {slugs:?}");

    Ok(())
}

#[test]
fn lock_helper_process() {
    if std::env::var("SLATE_LOCK_HELPER").ok().as_deref() != Some("1") {
        return;
    }

    let path = std::env::var("SLATE_LOCK_PATH").expect("SLATE_LOCK_PATH");
    let ready = std::env::var("SLATE_LOCK_READY").expect("SLATE_LOCK_READY");

    let _lock = FileLock::acquire_blocking(&path).expect("lock helper acquire");
    std::fs::write(&ready, "ready").expect("ready write");
    thread::sleep(Duration::from_secs(2));
}

#[test]
fn file_lock_timeout_when_held_by_other_process() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let lock_path = dir.path().join("lockfile.lock");
    let ready_path = dir.path().join("ready");

    let mut child = Command::new(std::env::current_exe()?)
        .args(["--exact", "lock_helper_process", "--nocapture"])
        .env("SLATE_LOCK_HELPER", "1")
        .env("SLATE_LOCK_PATH", lock_path.display().to_string())
        .env("SLATE_LOCK_READY", ready_path.display().to_string())
        .spawn()?;

    let start = Instant::now();
    while !ready_path.exists() {
        if start.elapsed() > READY_TIMEOUT {
            let _ = child.kill();
            return Err("lock helper not ready".into());
        }
        thread::sleep(READY_POLL_INTERVAL);
    }

    match FileLock::acquire(&lock_path, 100) {
        Ok(_) => return Err("expected lock timeout".into()),
        Err(err) => assert!(matches!(err, Error::LockFailed(_))),
    }

    child.wait()?;
    Ok(())
}
