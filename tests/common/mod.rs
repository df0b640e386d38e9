//! Common test utilities for UPack integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// A batch directory inside a temporary directory
///
/// The batch sits one level down so that the sibling archive directory and
/// transfer manifests land inside the same temporary directory.
pub struct TestBatch {
    pub temp: TempDir,
    pub path: PathBuf,
}

impl TestBatch {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().join("batch");
        fs::create_dir_all(&path).expect("Failed to create batch directory");
        Self { temp, path }
    }

    /// Two objects: obj1 with a 10 byte and an empty file, obj2 with one nested file
    pub fn with_two_objects() -> Self {
        let batch = Self::new();
        batch.write_file("obj1/a.txt", "0123456789");
        batch.write_file("obj1/empty.txt", "");
        batch.write_file("obj2/sub/b.txt", "hello");
        batch
    }

    pub fn write_file(&self, path: &str, content: &str) {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write file");
    }

    pub fn read_file(&self, path: &str) -> String {
        fs::read_to_string(self.path.join(path)).expect("Failed to read file")
    }

    pub fn file_exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    /// The sibling `<batch>-tarred` directory
    pub fn archive_dir(&self) -> PathBuf {
        self.temp.path().join("batch-tarred")
    }

    /// Write a file next to the batch, outside it
    pub fn write_outside(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        fs::write(&path, content).expect("Failed to write file");
        path
    }
}

/// The upack binary with a clean environment
#[allow(deprecated)]
pub fn upack_cmd() -> Command {
    let mut cmd = Command::cargo_bin("upack").unwrap();
    cmd.env_remove("UPACK_CONFIG").env_remove("RUST_LOG");
    cmd
}

/// Files in `dir` whose name starts with `prefix`, sorted
pub fn files_starting_with(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .expect("Failed to read directory")
        .map(|e| e.expect("Failed to read entry").path())
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(prefix))
        })
        .collect();
    found.sort();
    found
}

/// Recursively copy a directory tree
pub fn copy_dir_recursive(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).expect("Failed to create directory");
    for entry in fs::read_dir(src).expect("Failed to read directory") {
        let entry = entry.expect("Failed to read entry");
        let target = dst.join(entry.file_name());
        if entry.file_type().expect("Failed to stat entry").is_dir() {
            copy_dir_recursive(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).expect("Failed to copy file");
        }
    }
}
