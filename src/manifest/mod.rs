//! Manifest model shared by object inventories and transfer manifests
//!
//! A manifest is a table of files with their size and MD5 digest. Two
//! manifests are equal when they list the same set of `(path, digest)`
//! pairs; row order, sizes and comments do not take part in equality.
//! A row with an empty digest was never read, so a comparison never counts
//! it as matching.
//!
//! Two on-disk layouts are supported:
//! - inventory: `path,size_bytes,md5,comment`, followed by one row with an
//!   empty path that carries the object-level comment
//! - transfer: `path,md5`

pub mod build;
pub mod csv;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{PackError, Result};

pub use build::{FileFailure, ManifestBuild, build_manifest};

/// Header of the per-object inventory layout
pub const INVENTORY_HEADER: [&str; 4] = ["path", "size_bytes", "md5", "comment"];

/// Header of the transfer layout
pub const TRANSFER_HEADER: [&str; 2] = ["path", "md5"];

/// One file in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Path relative to the manifest root, `/`-separated
    pub path: String,
    pub size: u64,
    /// Lowercase hex digest; empty when the file could not be read
    pub digest: String,
    pub comment: String,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, size: u64, digest: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size,
            digest: digest.into(),
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Ordered table of file entries plus an object-level comment
#[derive(Debug, Clone, Default)]
pub struct ManifestRecord {
    entries: Vec<FileEntry>,
    comment: String,
}

impl PartialEq for ManifestRecord {
    fn eq(&self, other: &Self) -> bool {
        self.digest_map() == other.digest_map()
    }
}

impl Eq for ManifestRecord {}

/// Result of comparing two manifests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Comparison {
    Identical,
    Diff(ManifestDiff),
}

impl Comparison {
    pub fn is_identical(&self) -> bool {
        matches!(self, Comparison::Identical)
    }

    /// Turn a difference into the integrity error
    pub fn into_result(self) -> Result<()> {
        match self {
            Comparison::Identical => Ok(()),
            Comparison::Diff(diff) => Err(PackError::IntegrityMismatch {
                missing: diff.missing.into_iter().collect(),
                added: diff.added.into_iter().collect(),
                changed: diff.changed.into_iter().collect(),
                unverified: diff.unverified.into_iter().collect(),
            }),
        }
    }
}

/// Paths that differ between a "before" and an "after" manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDiff {
    /// Present before, absent after
    pub missing: BTreeSet<String>,
    /// Absent before, present after
    pub added: BTreeSet<String>,
    /// Present in both with different digests
    pub changed: BTreeSet<String>,
    /// Present in both, but unread on at least one side
    pub unverified: BTreeSet<String>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
            && self.added.is_empty()
            && self.changed.is_empty()
            && self.unverified.is_empty()
    }
}

impl ManifestRecord {
    /// Build a record; entries are sorted by path
    pub fn new(mut entries: Vec<FileEntry>, comment: impl Into<String>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            entries,
            comment: comment.into(),
        }
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.entries[i])
    }

    fn digest_map(&self) -> BTreeMap<&str, &str> {
        self.entries
            .iter()
            .map(|e| (e.path.as_str(), e.digest.as_str()))
            .collect()
    }

    /// Compare `self` (before) against `after`, keyed by path
    pub fn compare(&self, after: &ManifestRecord) -> Comparison {
        let before = self.digest_map();
        let after = after.digest_map();
        let mut diff = ManifestDiff::default();

        for (path, digest) in &before {
            match after.get(path) {
                None => {
                    diff.missing.insert((*path).to_string());
                }
                Some(other) if other.is_empty() || digest.is_empty() => {
                    diff.unverified.insert((*path).to_string());
                }
                Some(other) if other != digest => {
                    diff.changed.insert((*path).to_string());
                }
                Some(_) => {}
            }
        }
        for path in after.keys() {
            if !before.contains_key(path) {
                diff.added.insert((*path).to_string());
            }
        }

        if diff.is_empty() {
            Comparison::Identical
        } else {
            Comparison::Diff(diff)
        }
    }

    /// Render the inventory layout
    pub fn to_inventory_csv(&self) -> String {
        let mut out = String::new();
        csv::write_row(&mut out, &INVENTORY_HEADER);
        for entry in &self.entries {
            let size = entry.size.to_string();
            csv::write_row(
                &mut out,
                &[
                    entry.path.as_str(),
                    size.as_str(),
                    entry.digest.as_str(),
                    entry.comment.as_str(),
                ],
            );
        }
        csv::write_row(&mut out, &["", "", "", self.comment.as_str()]);
        out
    }

    /// Render the transfer layout
    pub fn to_transfer_csv(&self) -> String {
        let mut out = String::new();
        csv::write_row(&mut out, &TRANSFER_HEADER);
        for entry in &self.entries {
            csv::write_row(&mut out, &[entry.path.as_str(), entry.digest.as_str()]);
        }
        out
    }

    /// Parse either layout, detected from the header row
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        let fail = |reason: String| crate::error::manifest_parse_failed(source, reason);

        let rows = csv::parse_rows(content).map_err(fail)?;
        let mut rows = rows.into_iter();
        let header = rows.next().ok_or_else(|| fail("empty manifest".to_string()))?;
        let header: Vec<&str> = header.iter().map(|h| h.trim()).collect();

        let inventory = if header == INVENTORY_HEADER {
            true
        } else if header == TRANSFER_HEADER {
            false
        } else {
            return Err(fail(format!("unrecognised header: {}", header.join(","))));
        };

        let mut entries = Vec::new();
        let mut seen = BTreeSet::new();
        let mut comment = String::new();

        for (index, row) in rows.enumerate() {
            let line = index + 2;
            let entry = if inventory {
                if row.len() != 4 {
                    return Err(fail(format!("line {line}: expected 4 fields, found {}", row.len())));
                }
                if row[0].is_empty() {
                    comment.clone_from(&row[3]);
                    continue;
                }
                let size = if row[1].is_empty() {
                    0
                } else {
                    row[1]
                        .parse::<u64>()
                        .map_err(|e| fail(format!("line {line}: bad size '{}': {e}", row[1])))?
                };
                FileEntry::new(&row[0], size, &row[2]).with_comment(&row[3])
            } else {
                if row.len() != 2 {
                    return Err(fail(format!("line {line}: expected 2 fields, found {}", row.len())));
                }
                FileEntry::new(&row[0], 0, &row[1])
            };

            if !seen.insert(entry.path.clone()) {
                return Err(fail(format!("line {line}: duplicate path '{}'", entry.path)));
            }
            entries.push(entry);
        }

        Ok(Self::new(entries, comment))
    }

    /// Read and parse a manifest file
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PackError::FileReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string())
    }
}
