//! End-to-end runs of the stage pipeline over a temporary batch

mod common;

use std::fs;

use common::{TestBatch, upack_cmd};
use predicates::prelude::*;

const MD5_0_TO_9: &str = "781e5e245d69b566979b86e28d23f2c7";
const MD5_EMPTY: &str = "d41d8cd98f00b204e9800998ecf8427e";

#[test]
fn test_default_run_manifests_bags_and_archives() {
    let batch = TestBatch::with_two_objects();

    upack_cmd()
        .arg("run")
        .arg(&batch.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("manifest: 2 created"))
        .stdout(predicate::str::contains("bag: 2 created"))
        .stdout(predicate::str::contains("(2 valid, 0 invalid)"))
        .stdout(predicate::str::contains("archive: 2 created"));

    // The inventory travelled into the payload with the files it lists
    let inventory = batch.read_file("obj1/data/manifest.csv");
    assert!(inventory.starts_with("path,size_bytes,md5,comment\n"));
    assert!(inventory.contains(&format!("a.txt,10,{MD5_0_TO_9},")));
    assert!(inventory.contains(&format!("empty.txt,0,{MD5_EMPTY},")));
    assert!(!inventory.contains("manifest.csv,"));

    assert!(batch.file_exists("obj1/bagit.txt"));
    assert!(batch.file_exists("obj1/manifest-md5.txt"));
    assert!(batch.file_exists("obj2/data/sub/b.txt"));

    let archives = batch.archive_dir();
    assert!(archives.join("obj1.tar.gz").is_file());
    assert!(archives.join("obj2.tar.gz").is_file());
}

#[test]
fn test_rerun_changes_nothing() {
    let batch = TestBatch::with_two_objects();
    upack_cmd().arg("run").arg(&batch.path).assert().success();

    let archive = batch.archive_dir().join("obj1.tar.gz");
    let archive_before = fs::read(&archive).unwrap();
    let bag_info_before = batch.read_file("obj1/bag-info.txt");

    upack_cmd()
        .arg("run")
        .arg(&batch.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("bag: 0 created, 2 skipped"))
        .stdout(predicate::str::contains("archive: 0 created, 2 skipped"));

    assert_eq!(fs::read(&archive).unwrap(), archive_before);
    assert_eq!(batch.read_file("obj1/bag-info.txt"), bag_info_before);
    assert!(!batch.file_exists("obj1/data/data"));
}

#[test]
fn test_existing_manifest_kept_by_default() {
    let batch = TestBatch::with_two_objects();
    batch.write_file("obj1/manifest.csv", "hand written\n");

    upack_cmd()
        .args(["run", "--stages", "manifest"])
        .arg(&batch.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("manifest: 1 created, 1 skipped"));

    assert_eq!(batch.read_file("obj1/manifest.csv"), "hand written\n");
    assert!(batch.file_exists("obj2/manifest.csv"));
}

#[test]
fn test_overwrite_regenerates_manifests() {
    let batch = TestBatch::with_two_objects();
    batch.write_file("obj1/manifest.csv", "hand written\n");

    upack_cmd()
        .args(["manifest", "--overwrite"])
        .arg(&batch.path)
        .assert()
        .success();

    assert!(batch.read_file("obj1/manifest.csv").contains(MD5_0_TO_9));
}

#[test]
fn test_overwrite_on_bagged_batch_keeps_one_inventory() {
    let batch = TestBatch::with_two_objects();
    upack_cmd()
        .args(["run", "--stages", "manifest,bag"])
        .arg(&batch.path)
        .assert()
        .success();
    let inventory_before = batch.read_file("obj1/data/manifest.csv");

    upack_cmd()
        .args(["manifest", "--overwrite"])
        .arg(&batch.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("manifest: 0 created, 2 skipped"));

    assert!(!batch.file_exists("obj1/manifest.csv"));
    assert_eq!(batch.read_file("obj1/data/manifest.csv"), inventory_before);

    upack_cmd()
        .arg("verify-bag")
        .arg(&batch.path)
        .assert()
        .success();
}

#[test]
fn test_rebag_declined_without_flag() {
    let batch = TestBatch::with_two_objects();
    upack_cmd()
        .args(["run", "--stages", "manifest,bag"])
        .arg(&batch.path)
        .assert()
        .success();

    upack_cmd().arg("bag").arg(&batch.path).assert().success();
    assert!(!batch.file_exists("obj1/data/data"));
    assert!(batch.file_exists("obj1/data/a.txt"));
}

#[test]
fn test_rebag_nests_existing_bag() {
    let batch = TestBatch::with_two_objects();
    upack_cmd()
        .args(["run", "--stages", "manifest,bag"])
        .arg(&batch.path)
        .assert()
        .success();

    upack_cmd()
        .args(["bag", "--rebag"])
        .arg(&batch.path)
        .assert()
        .success();

    assert!(batch.file_exists("obj1/data/data/a.txt"));
    assert!(batch.file_exists("obj1/data/bagit.txt"));
    assert!(batch.file_exists("obj1/bagit.txt"));
}

#[test]
fn test_manifest_failure_keeps_object_out_of_bag() {
    let batch = TestBatch::with_two_objects();
    // The manifest cannot be written over a directory of the same name
    fs::create_dir_all(batch.path.join("obj2/manifest.csv")).unwrap();

    upack_cmd()
        .args(["run", "--stages", "manifest,bag"])
        .arg(&batch.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("manifest: 1 created, 0 skipped, 1 failed"))
        .stdout(predicate::str::contains("failed obj2"));

    assert!(batch.file_exists("obj1/bagit.txt"));
    assert!(!batch.file_exists("obj2/bagit.txt"));
    assert!(batch.file_exists("obj2/sub/b.txt"));
}

#[test]
fn test_archive_stage_alone_uncompressed() {
    let batch = TestBatch::with_two_objects();

    upack_cmd()
        .args(["archive", "--compression", "none"])
        .arg(&batch.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("archive: 2 created"));

    assert!(batch.archive_dir().join("obj1.tar").is_file());
    assert!(!batch.archive_dir().join("obj1.tar.gz").exists());
}

#[test]
fn test_existing_archive_untouched() {
    let batch = TestBatch::with_two_objects();
    fs::create_dir_all(batch.archive_dir()).unwrap();
    fs::write(batch.archive_dir().join("obj1.tar.gz"), "not really").unwrap();

    upack_cmd()
        .arg("archive")
        .arg(&batch.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("archive: 1 created, 1 skipped"));

    assert_eq!(
        fs::read_to_string(batch.archive_dir().join("obj1.tar.gz")).unwrap(),
        "not really"
    );
}

#[test]
fn test_prepack_nests_content_and_keeps_metadata() {
    let batch = TestBatch::new();
    batch.write_file("obj1/a.txt", "a");
    batch.write_file("obj1/metadata.xml", "<m/>");
    batch.write_file("obj1/images/p1.tif", "tif");

    upack_cmd()
        .args(["run", "--stages", "prepack"])
        .arg(&batch.path)
        .assert()
        .success();

    assert!(batch.file_exists("obj1/metadata.xml"));
    assert!(batch.file_exists("obj1/obj1/a.txt"));
    assert!(batch.file_exists("obj1/obj1/images/p1.tif"));
    assert!(!batch.file_exists("obj1/a.txt"));
}

#[test]
fn test_run_json_report() {
    let batch = TestBatch::with_two_objects();

    let output = upack_cmd()
        .args(["run", "--json", "--stages", "manifest"])
        .arg(&batch.path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let stages = report["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0]["stage"], "manifest");
}

#[test]
fn test_hidden_directories_are_not_objects() {
    let batch = TestBatch::with_two_objects();
    batch.write_file(".trash/x.txt", "x");

    upack_cmd()
        .args(["manifest"])
        .arg(&batch.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("manifest: 2 created"));

    assert!(!batch.file_exists(".trash/manifest.csv"));
}
