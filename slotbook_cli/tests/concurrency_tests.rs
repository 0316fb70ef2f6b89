//! Concurrency tests for the slotbook binary.
//!
//! These tests verify that multiple processes sharing one journal:
//! - Never double-book a slot (file locking around check-and-insert)
//! - Apply a payment outcome exactly once
//! - Book distinct slots without losing records

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

const NOW: &str = "2025-02-01T00:00:00Z";

fn cli() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("slotbook"));
    cmd.env_remove("SLOTBOOK_TOKEN");
    cmd
}

fn setup_test_dir() -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = temp_dir.path().join("data");
    let config_path = temp_dir.path().join("config.toml");

    let tokens: String = (0..8)
        .map(|i| format!("tok-u{} = \"U{}\"\n", i, i))
        .collect();
    fs::write(&config_path, format!("[auth.tokens]\n{}", tokens))
        .expect("Failed to write config");

    (temp_dir, data_dir, config_path)
}

fn base_cmd(data_dir: &Path, config_path: &Path) -> Command {
    let mut cmd = cli();
    cmd.arg("--data-dir")
        .arg(data_dir)
        .arg("--config")
        .arg(config_path)
        .arg("--now")
        .arg(NOW);
    cmd
}

fn journal_lines(data_dir: &Path) -> Vec<String> {
    fs::read_to_string(data_dir.join("journal/reservations.jsonl"))
        .expect("Failed to read journal")
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[test]
fn test_concurrent_reservations_single_winner() {
    let (_temp_dir, data_dir, config_path) = setup_test_dir();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let data_dir = data_dir.clone();
            let config_path = config_path.clone();
            thread::spawn(move || {
                base_cmd(&data_dir, &config_path)
                    .args([
                        "reserve",
                        "--provider",
                        "P1",
                        "--at",
                        "2025-03-01T09:00:00Z",
                        "--token",
                        &format!("tok-u{}", i),
                    ])
                    .output()
                    .expect("Failed to run slotbook")
            })
        })
        .collect();

    let codes: Vec<Option<i32>> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked").status.code())
        .collect();

    let winners = codes.iter().filter(|c| **c == Some(0)).count();
    let conflicts = codes.iter().filter(|c| **c == Some(5)).count();
    assert_eq!(winners, 1, "exit codes: {:?}", codes);
    assert_eq!(conflicts, 7, "exit codes: {:?}", codes);

    // Only the winner reached the journal
    assert_eq!(journal_lines(&data_dir).len(), 1);
}

#[test]
fn test_concurrent_distinct_slots_all_recorded() {
    let (_temp_dir, data_dir, config_path) = setup_test_dir();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let data_dir = data_dir.clone();
            let config_path = config_path.clone();
            thread::spawn(move || {
                base_cmd(&data_dir, &config_path)
                    .args([
                        "reserve",
                        "--provider",
                        &format!("P{}", i),
                        "--at",
                        "2025-03-01T09:00:00Z",
                        "--token",
                        "tok-u0",
                    ])
                    .output()
                    .expect("Failed to run slotbook")
            })
        })
        .collect();

    for handle in handles {
        let output = handle.join().expect("Thread panicked");
        assert!(output.status.success());
    }

    let lines = journal_lines(&data_dir);
    assert_eq!(lines.len(), 6);
    for line in &lines {
        serde_json::from_str::<serde_json::Value>(line).expect("Journal line is not JSON");
    }
}

#[test]
fn test_concurrent_payment_outcomes_single_transition() {
    let (_temp_dir, data_dir, config_path) = setup_test_dir();

    let output = base_cmd(&data_dir, &config_path)
        .args([
            "reserve",
            "--provider",
            "P1",
            "--at",
            "2025-03-01T09:00:00Z",
            "--token",
            "tok-u0",
        ])
        .output()
        .expect("Failed to run slotbook");
    assert!(output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = body["reservation"]["id"].as_str().unwrap().to_string();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let data_dir = data_dir.clone();
            let config_path = config_path.clone();
            let id = id.clone();
            let outcome = if i % 2 == 0 { "success" } else { "failure" };
            thread::spawn(move || {
                base_cmd(&data_dir, &config_path)
                    .args(["confirm", "--reservation", &id, "--outcome", outcome])
                    .output()
                    .expect("Failed to run slotbook")
            })
        })
        .collect();

    let statuses: Vec<String> = handles
        .into_iter()
        .map(|h| {
            let output = h.join().expect("Thread panicked");
            assert!(output.status.success());
            let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
            body["status"].as_str().unwrap().to_string()
        })
        .collect();

    // Every delivery reports the single outcome that won
    assert!(statuses.iter().all(|s| *s == statuses[0]), "{:?}", statuses);
    assert_ne!(statuses[0], "PENDING");
    assert_eq!(journal_lines(&data_dir).len(), 2);
}
