use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use swipe_review::journal::SubmissionJournal;
use swipe_review::sink::Submission;
use swipe_review::{ItemStatus, ReviewTally, StatusEntry};
use tempfile::TempDir;

/// Helper to run the binary in an isolated working directory
fn swipe_review(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("swipe-review").unwrap();
    cmd.current_dir(dir.path()).env_remove("SWIPE_REVIEW_CONFIG");
    cmd
}

/// Helper to create a journal with one rejected-items submission
fn seed_journal(path: &Path) {
    let mut journal = SubmissionJournal::open(path).unwrap();
    journal
        .record(&Submission {
            resume_token: Some("https://hooks.example/resume/7".to_string()),
            items: vec![
                StatusEntry {
                    file_id: "img-b".to_string(),
                    status: ItemStatus::Rejected,
                },
                StatusEntry {
                    file_id: "img-c".to_string(),
                    status: ItemStatus::Rejected,
                },
            ],
            summary: ReviewTally {
                approved: 1,
                rejected: 2,
                total: 3,
            },
        })
        .unwrap();
}

#[test]
fn history_without_journal_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    swipe_review(&dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No submissions recorded"));
}

#[test]
fn history_lists_recorded_submissions() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("journal.db");
    seed_journal(&journal);

    swipe_review(&dir)
        .args(["history", "--journal"])
        .arg(&journal)
        .assert()
        .success()
        .stdout(predicate::str::contains("Submissions (1)"))
        .stdout(predicate::str::contains("https://hooks.example/resume/7"));
}

#[test]
fn history_show_prints_items() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("journal.db");
    seed_journal(&journal);

    swipe_review(&dir)
        .args(["history", "--show", "1", "--journal"])
        .arg(&journal)
        .assert()
        .success()
        .stdout(predicate::str::contains("img-b\tnot approved"))
        .stdout(predicate::str::contains("img-c\tnot approved"));

    swipe_review(&dir)
        .args(["history", "--show", "9", "--journal"])
        .arg(&journal)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No submission with id 9"));
}

#[test]
fn missing_folder_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    swipe_review(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No folder given"));
}

#[test]
fn remote_review_requires_fetch_url() {
    let dir = tempfile::tempdir().unwrap();
    swipe_review(&dir)
        .args(["review", "1AbCdEfGhIj"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No fetch URL configured"));
}

#[test]
fn local_review_requires_directory() {
    let dir = tempfile::tempdir().unwrap();
    swipe_review(&dir)
        .args(["--local", "no-such-dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a directory"));
}

#[test]
fn invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "[review]\ndrag_threshold = -5.0\n").unwrap();

    swipe_review(&dir)
        .arg("--config")
        .arg(&config)
        .arg("history")
        .assert()
        .failure()
        .stderr(predicate::str::contains("drag_threshold"));
}

#[test]
fn config_file_from_environment_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "fetch_url = \"ftp://nope\"\n").unwrap();

    swipe_review(&dir)
        .env("SWIPE_REVIEW_CONFIG", &config)
        .args(["review", "1AbCdEfGhIj"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("fetch_url must be an http(s) URL"));
}
