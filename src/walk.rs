//! Recursive file enumeration for manifests
//!
//! Symbolic links are never followed. They are reported as their own item so
//! callers can note them in a manifest comment instead of failing.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;

/// One thing found while walking an object or batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkItem {
    /// A regular file
    File { path: PathBuf, relative: String },
    /// A symbolic link, recorded but not followed
    Symlink { path: PathBuf, relative: String },
    /// An entry that could not be inspected
    Unreadable {
        path: PathBuf,
        relative: String,
        reason: String,
    },
}

impl WalkItem {
    pub fn relative(&self) -> &str {
        match self {
            WalkItem::File { relative, .. }
            | WalkItem::Symlink { relative, .. }
            | WalkItem::Unreadable { relative, .. } => relative,
        }
    }
}

/// Convert a path below `root` into a `/`-separated relative path
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Direct children of a directory, sorted; any unreadable entry is an error
pub fn list_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Walks every regular file under a root
///
/// The walker holds no iteration state, so [`FileWalker::walk`] can be
/// called again to restart from the beginning. Items are produced in file
/// name order within each directory.
#[derive(Debug, Clone)]
pub struct FileWalker {
    root: PathBuf,
    excluded: Vec<String>,
    ignore_names: Vec<String>,
}

impl FileWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded: Vec::new(),
            ignore_names: Vec::new(),
        }
    }

    /// Skip one relative path (file or directory) below the root
    pub fn exclude(mut self, relative: impl Into<String>) -> Self {
        self.excluded.push(relative.into());
        self
    }

    /// Skip every entry with one of these file names, at any depth
    pub fn ignore_names(mut self, names: &[String]) -> Self {
        self.ignore_names.extend(names.iter().cloned());
        self
    }

    fn is_skipped(&self, relative: &str, file_name: &str) -> bool {
        self.excluded.iter().any(|e| e == relative)
            || self.ignore_names.iter().any(|n| n == file_name)
    }

    /// Start a fresh walk
    pub fn walk(&self) -> impl Iterator<Item = WalkItem> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1)
            .into_iter()
            .filter_entry(move |entry| {
                let relative = relative_path(&self.root, entry.path());
                let name = entry.file_name().to_string_lossy();
                !self.is_skipped(&relative, &name)
            })
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    let path = entry.path().to_path_buf();
                    let relative = relative_path(&self.root, &path);
                    let file_type = entry.file_type();
                    if file_type.is_symlink() {
                        Some(WalkItem::Symlink { path, relative })
                    } else if file_type.is_file() {
                        Some(WalkItem::File { path, relative })
                    } else {
                        if !file_type.is_dir() {
                            debug!(path = %path.display(), "skipping special file");
                        }
                        None
                    }
                }
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let relative = relative_path(&self.root, &path);
                    Some(WalkItem::Unreadable {
                        path,
                        relative,
                        reason: err.to_string(),
                    })
                }
            })
    }

    /// Collect every item of a walk, sorted by relative path
    #[cfg(test)]
    pub fn collect_sorted(&self) -> Vec<WalkItem> {
        let mut items: Vec<WalkItem> = self.walk().collect();
        items.sort_by(|a, b| a.relative().cmp(b.relative()));
        items
    }
}
