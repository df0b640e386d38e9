//! Batch-wide transfer manifests
//!
//! A transfer manifest is a flat `path,md5` table over every file below a
//! root. One is written before the batch is moved and another after; the
//! two must compare identical.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::archive;
use crate::config::PackConfig;
use crate::error::{PackError, Result};
use crate::hash::HashOptions;
use crate::inventory::write_atomic;
use crate::manifest::{Comparison, FileFailure, ManifestRecord, build_manifest};
use crate::walk::FileWalker;

/// A transfer manifest that has been written to disk
#[derive(Debug, Clone)]
pub struct TransferManifest {
    pub root: PathBuf,
    pub path: PathBuf,
    pub record: ManifestRecord,
    pub failures: Vec<FileFailure>,
}

/// `Transfer_<root name>_<YYYYMMDD>_<HHMMSS>.<ext>`
pub fn transfer_file_name(root: &Path, config: &PackConfig, at: DateTime<Local>) -> String {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    format!(
        "Transfer_{name}_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        config.transfer_extension
    )
}

/// The directory a pipeline run builds its transfer manifest over
///
/// Once a batch has been archived the archives are what travel, so the
/// archive directory is preferred when it exists.
pub fn transfer_root_for(batch_root: &Path, config: &PackConfig) -> Result<PathBuf> {
    let archived = archive::output_dir_for(batch_root, config)?;
    if archived.is_dir() {
        Ok(archived)
    } else {
        Ok(batch_root.to_path_buf())
    }
}

/// Hash every file under `root` without writing anything
pub fn scan(root: &Path, config: &PackConfig) -> Result<(ManifestRecord, Vec<FileFailure>)> {
    if !root.is_dir() {
        return Err(PackError::BatchNotFound {
            path: root.display().to_string(),
        });
    }
    let walker = FileWalker::new(root).ignore_names(&config.ignore_names);
    let build = build_manifest(&walker, HashOptions::from(config), "");
    for failure in &build.failures {
        warn!(path = %failure.path, "not hashed: {}", failure.reason);
    }
    Ok((build.record, build.failures))
}

/// Build a transfer manifest for `root` and write it into `root`'s parent
pub fn build_transfer_manifest(root: &Path, config: &PackConfig) -> Result<TransferManifest> {
    let root = dunce::canonicalize(root).map_err(|_| PackError::BatchNotFound {
        path: root.display().to_string(),
    })?;
    let (record, failures) = scan(&root, config)?;

    let parent = root.parent().unwrap_or_else(|| Path::new("."));
    let path = free_name(parent, &transfer_file_name(&root, config, Local::now()));
    write_atomic(&path, &record.to_transfer_csv())?;
    info!(manifest = %path.display(), files = record.len(), "wrote transfer manifest");

    Ok(TransferManifest {
        root,
        path,
        record,
        failures,
    })
}

/// Two runs in the same second must not overwrite each other
fn free_name(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    (2..)
        .map(|n| {
            if ext.is_empty() {
                dir.join(format!("{stem}_{n}"))
            } else {
                dir.join(format!("{stem}_{n}.{ext}"))
            }
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Compare two manifest files on disk, `before` first
pub fn compare_files(before: &Path, after: &Path) -> Result<Comparison> {
    let before = ManifestRecord::read(before)?;
    let after = ManifestRecord::read(after)?;
    Ok(before.compare(&after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn batch(temp: &TempDir) -> PathBuf {
        let root = temp.path().join("batch");
        fs::create_dir_all(root.join("obj1")).unwrap();
        fs::create_dir_all(root.join("obj2")).unwrap();
        fs::write(root.join("obj1/ten.txt"), "0123456789").unwrap();
        fs::write(root.join("obj1/empty.txt"), "").unwrap();
        fs::write(root.join("obj2/one.txt"), "1").unwrap();
        fs::write(root.join("obj2/.DS_Store"), "junk").unwrap();
        root
    }

    #[test]
    fn test_file_name_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let name = transfer_file_name(Path::new("/x/batch"), &PackConfig::default(), at);
        assert_eq!(name, "Transfer_batch_20240305_140709.csv");
    }

    #[test]
    fn test_written_into_parent_with_flat_paths() {
        let temp = TempDir::new().unwrap();
        let root = batch(&temp);
        let manifest = build_transfer_manifest(&root, &PackConfig::default()).unwrap();

        assert_eq!(
            manifest.path.parent().unwrap(),
            dunce::canonicalize(temp.path()).unwrap()
        );
        assert_eq!(manifest.record.len(), 3);
        assert!(manifest.record.get("obj1/ten.txt").is_some());
        assert!(manifest.record.get("obj2/.DS_Store").is_none());

        let reread = ManifestRecord::read(&manifest.path).unwrap();
        assert_eq!(reread, manifest.record);
    }

    #[test]
    fn test_same_second_does_not_overwrite() {
        let temp = TempDir::new().unwrap();
        let root = batch(&temp);
        let first = build_transfer_manifest(&root, &PackConfig::default()).unwrap();
        let second = build_transfer_manifest(&root, &PackConfig::default()).unwrap();
        assert_ne!(first.path, second.path);
        assert!(first.path.exists());
    }

    #[test]
    fn test_identical_after_move() {
        let temp = TempDir::new().unwrap();
        let root = batch(&temp);
        let before = build_transfer_manifest(&root, &PackConfig::default()).unwrap();

        let moved_parent = temp.path().join("elsewhere");
        fs::create_dir(&moved_parent).unwrap();
        let moved = moved_parent.join("batch");
        fs::rename(&root, &moved).unwrap();

        let after = build_transfer_manifest(&moved, &PackConfig::default()).unwrap();
        assert!(before.record.compare(&after.record).is_identical());
        assert!(
            compare_files(&before.path, &after.path)
                .unwrap()
                .is_identical()
        );
    }

    #[test]
    fn test_truncated_file_is_changed() {
        let temp = TempDir::new().unwrap();
        let root = batch(&temp);
        let before = build_transfer_manifest(&root, &PackConfig::default()).unwrap();

        fs::write(root.join("obj1/ten.txt"), "01234").unwrap();
        let after = build_transfer_manifest(&root, &PackConfig::default()).unwrap();

        match before.record.compare(&after.record) {
            Comparison::Diff(diff) => {
                assert_eq!(diff.changed.iter().collect::<Vec<_>>(), vec!["obj1/ten.txt"]);
                assert!(diff.missing.is_empty());
                assert!(diff.added.is_empty());
            }
            Comparison::Identical => panic!("truncation not detected"),
        }
    }

    #[test]
    fn test_prefers_archive_directory() {
        let temp = TempDir::new().unwrap();
        let root = batch(&temp);
        let config = PackConfig::default();
        assert_eq!(transfer_root_for(&root, &config).unwrap(), root);

        fs::create_dir(temp.path().join("batch-tarred")).unwrap();
        assert_eq!(
            transfer_root_for(&root, &config).unwrap(),
            temp.path().join("batch-tarred")
        );
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = build_transfer_manifest(&temp.path().join("nope"), &PackConfig::default());
        assert!(matches!(result, Err(PackError::BatchNotFound { .. })));
    }
}
