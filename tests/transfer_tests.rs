//! Transfer manifests and their comparison across a move

mod common;

use std::fs;

use common::{TestBatch, copy_dir_recursive, files_starting_with, upack_cmd};
use predicates::prelude::*;

fn archived_batch() -> TestBatch {
    let batch = TestBatch::with_two_objects();
    upack_cmd().arg("run").arg(&batch.path).assert().success();
    batch
}

#[test]
fn test_transfer_manifest_written_next_to_root() {
    let batch = archived_batch();

    upack_cmd()
        .arg("transfer")
        .arg(batch.archive_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"))
        .stdout(predicate::str::contains("(2 files)"));

    let written = files_starting_with(batch.temp.path(), "Transfer_batch-tarred_");
    assert_eq!(written.len(), 1);
    let content = fs::read_to_string(&written[0]).unwrap();
    assert!(content.starts_with("path,md5\n"));
    assert!(content.contains("obj1.tar.gz,"));
    assert!(content.contains("obj2.tar.gz,"));
}

#[test]
fn test_transfer_verified_after_move() {
    let batch = archived_batch();
    upack_cmd()
        .arg("transfer")
        .arg(batch.archive_dir())
        .assert()
        .success();
    let before = files_starting_with(batch.temp.path(), "Transfer_").remove(0);

    let destination = batch.temp.path().join("mnt");
    let moved = destination.join("batch-tarred");
    copy_dir_recursive(&batch.archive_dir(), &moved);

    upack_cmd()
        .arg("transfer")
        .arg(&moved)
        .arg("--against")
        .arg(&before)
        .assert()
        .success()
        .stdout(predicate::str::contains("Identical"));

    assert_eq!(files_starting_with(&destination, "Transfer_").len(), 1);
}

#[test]
fn test_transfer_detects_truncated_archive() {
    let batch = archived_batch();
    upack_cmd()
        .arg("transfer")
        .arg(batch.archive_dir())
        .assert()
        .success();
    let before = files_starting_with(batch.temp.path(), "Transfer_").remove(0);

    let moved = batch.temp.path().join("mnt").join("batch-tarred");
    copy_dir_recursive(&batch.archive_dir(), &moved);
    let damaged = moved.join("obj1.tar.gz");
    let bytes = fs::read(&damaged).unwrap();
    fs::write(&damaged, &bytes[..bytes.len() / 2]).unwrap();
    fs::remove_file(moved.join("obj2.tar.gz")).unwrap();

    upack_cmd()
        .arg("transfer")
        .arg(&moved)
        .arg("--against")
        .arg(&before)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("MISMATCH"))
        .stdout(predicate::str::contains("obj1.tar.gz"))
        .stdout(predicate::str::contains("obj2.tar.gz"))
        .stderr(predicate::str::contains("1 missing, 0 added, 1 changed"));
}

#[test]
fn test_transfer_json_comparison() {
    let batch = archived_batch();
    upack_cmd()
        .arg("transfer")
        .arg(batch.archive_dir())
        .assert()
        .success();
    let before = files_starting_with(batch.temp.path(), "Transfer_").remove(0);
    fs::write(batch.archive_dir().join("extra.txt"), "new").unwrap();

    let output = upack_cmd()
        .arg("transfer")
        .arg(batch.archive_dir())
        .arg("--against")
        .arg(&before)
        .arg("--json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let comparison: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(comparison["status"], "diff");
    assert_eq!(comparison["added"][0], "extra.txt");
}

#[test]
fn test_transfer_missing_against_file() {
    let batch = archived_batch();
    upack_cmd()
        .arg("transfer")
        .arg(batch.archive_dir())
        .arg("--against")
        .arg(batch.temp.path().join("nope.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));

    assert!(files_starting_with(batch.temp.path(), "Transfer_").is_empty());
}

#[test]
fn test_compare_command() {
    let batch = TestBatch::new();
    let a = batch.write_outside("a.csv", "path,md5\nx,1\ny,2\n");
    let b = batch.write_outside("b.csv", "path,md5\ny,2\nx,1\n");
    let c = batch.write_outside("c.csv", "path,md5\nx,9\n");

    upack_cmd()
        .arg("compare")
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::contains("Identical"));

    upack_cmd()
        .arg("compare")
        .arg(&a)
        .arg(&c)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("missing"))
        .stdout(predicate::str::contains("changed"));
}

#[test]
fn test_compare_rejects_unknown_layout() {
    let batch = TestBatch::new();
    let a = batch.write_outside("a.csv", "name,sum\nx,1\n");
    let b = batch.write_outside("b.csv", "path,md5\nx,1\n");

    upack_cmd()
        .arg("compare")
        .arg(&a)
        .arg(&b)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognised header"));
}

#[test]
fn test_unread_file_is_never_reported_identical() {
    let batch = TestBatch::new();
    // A manifest row without a digest stands for a file that could not be read
    let a = batch.write_outside("a.csv", "path,md5\nobj1.tar.gz,\nobj2.tar.gz,2\n");
    let b = batch.write_outside("b.csv", "path,md5\nobj1.tar.gz,\nobj2.tar.gz,2\n");

    upack_cmd()
        .arg("compare")
        .arg(&a)
        .arg(&b)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("MISMATCH"))
        .stdout(predicate::str::contains("unread"))
        .stdout(predicate::str::contains("obj1.tar.gz"))
        .stderr(predicate::str::contains("1 unverified"));
}

#[test]
fn test_transfer_against_manifest_with_unread_file() {
    let batch = archived_batch();
    let before = batch.write_outside(
        "earlier.csv",
        &format!(
            "path,md5\nobj1.tar.gz,\nobj2.tar.gz,{}\n",
            md5_hex(&batch.archive_dir().join("obj2.tar.gz"))
        ),
    );

    upack_cmd()
        .arg("transfer")
        .arg(batch.archive_dir())
        .arg("--against")
        .arg(&before)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("unread"))
        .stderr(predicate::str::contains("0 changed, 1 unverified"));
}

fn md5_hex(path: &std::path::Path) -> String {
    use md5::{Digest, Md5};
    hex::encode(Md5::digest(fs::read(path).unwrap()))
}
