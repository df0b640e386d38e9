//! Walk-and-hash accumulator that turns a directory into a manifest
//!
//! A file that cannot be read becomes a row with an empty digest and a
//! comment, plus an entry in [`ManifestBuild::failures`]. Nothing here
//! returns early on a single bad file.

use std::fs;

use rayon::prelude::*;
use tracing::warn;

use super::{FileEntry, ManifestRecord};
use crate::error::PackError;
use crate::hash::{self, HashOptions};
use crate::walk::{FileWalker, WalkItem};

/// A file that could not be hashed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of building one manifest
#[derive(Debug, Clone)]
pub struct ManifestBuild {
    pub record: ManifestRecord,
    /// Paths hashed successfully
    pub hashed: Vec<String>,
    /// Paths recorded without a digest
    pub failures: Vec<FileFailure>,
    /// Symbolic links recorded but not followed
    pub symlinks: Vec<String>,
}

impl ManifestBuild {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Row {
    Hashed(FileEntry),
    Failed(FileEntry, FileFailure),
    Link(FileEntry),
}

/// The OS reason behind a read failure, without the path the row already names
fn failure_reason(error: PackError) -> String {
    match error {
        PackError::FileReadFailed { reason, .. } => reason,
        other => other.to_string(),
    }
}

fn hash_item(item: WalkItem, options: HashOptions) -> Row {
    match item {
        WalkItem::File { path, relative } => {
            let size = fs::symlink_metadata(&path).map(|m| m.len()).unwrap_or(0);
            match hash::md5_file(&path, options) {
                Ok(digest) => Row::Hashed(FileEntry::new(relative, size, digest)),
                Err(e) => {
                    let reason = failure_reason(e);
                    warn!(path = %path.display(), "could not hash file: {reason}");
                    let comment = format!("unreadable: {reason}");
                    Row::Failed(
                        FileEntry::new(relative.clone(), size, "").with_comment(comment),
                        FileFailure {
                            path: relative,
                            reason,
                        },
                    )
                }
            }
        }
        WalkItem::Symlink { path, relative } => {
            let target = fs::read_link(&path)
                .map(|t| t.display().to_string())
                .unwrap_or_else(|_| "unknown target".to_string());
            warn!(path = %path.display(), "symbolic link not followed");
            Row::Link(
                FileEntry::new(relative, 0, "")
                    .with_comment(format!("symbolic link to {target}, not followed")),
            )
        }
        WalkItem::Unreadable {
            path,
            relative,
            reason,
        } => {
            warn!(path = %path.display(), "could not read entry: {reason}");
            Row::Failed(
                FileEntry::new(relative.clone(), 0, "").with_comment(format!("unreadable: {reason}")),
                FileFailure {
                    path: relative,
                    reason,
                },
            )
        }
    }
}

/// Walk, hash in parallel, and collect a manifest
///
/// `object_comment` becomes the manifest's trailing comment; notes about
/// unreadable files and empty trees are appended to it.
pub fn build_manifest(
    walker: &FileWalker,
    options: HashOptions,
    object_comment: &str,
) -> ManifestBuild {
    let items: Vec<WalkItem> = walker.walk().collect();

    let rows: Vec<Row> = items
        .into_par_iter()
        .map(|item| hash_item(item, options))
        .collect();

    let mut entries = Vec::with_capacity(rows.len());
    let mut hashed = Vec::new();
    let mut failures = Vec::new();
    let mut symlinks = Vec::new();

    for row in rows {
        match row {
            Row::Hashed(entry) => {
                hashed.push(entry.path.clone());
                entries.push(entry);
            }
            Row::Failed(entry, failure) => {
                failures.push(failure);
                entries.push(entry);
            }
            Row::Link(entry) => {
                symlinks.push(entry.path.clone());
                entries.push(entry);
            }
        }
    }

    let mut notes: Vec<String> = Vec::new();
    if !object_comment.trim().is_empty() {
        notes.push(object_comment.trim().to_string());
    }
    if entries.is_empty() {
        notes.push("no files found".to_string());
    }
    if !failures.is_empty() {
        notes.push(format!("{} file(s) could not be read", failures.len()));
    }

    hashed.sort();
    failures.sort_by(|a, b| a.path.cmp(&b.path));
    symlinks.sort();

    ManifestBuild {
        record: ManifestRecord::new(entries, notes.join("; ")),
        hashed,
        failures,
        symlinks,
    }
}
