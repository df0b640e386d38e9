//! Stage preconditions read from the filesystem
//!
//! Whether a stage already ran for an object is encoded by the presence of
//! its artifact on disk. These checks are gathered behind one trait so the
//! sequencer can be driven by an in-memory batch in tests.

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::bag;
use crate::config::PackConfig;
use crate::error::{PackError, Result};
use crate::inventory;

pub trait ObjectInspector: Sync {
    /// Object directories of a batch, sorted by name
    fn list_objects(&self, batch_root: &Path) -> Result<Vec<PathBuf>>;

    fn has_manifest(&self, object: &Path) -> bool;

    fn is_bagged(&self, object: &Path) -> bool;

    fn has_archive(&self, object: &Path) -> bool;
}

/// Inspector over the real filesystem
#[derive(Debug, Clone)]
pub struct FsInspector {
    config: PackConfig,
    archive_dir: PathBuf,
}

impl FsInspector {
    pub fn new(config: PackConfig, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            archive_dir: archive_dir.into(),
        }
    }
}

impl ObjectInspector for FsInspector {
    /// Files at the batch root and hidden directories are not objects
    fn list_objects(&self, batch_root: &Path) -> Result<Vec<PathBuf>> {
        if !batch_root.is_dir() {
            return Err(PackError::BatchNotFound {
                path: batch_root.display().to_string(),
            });
        }
        let mut objects: Vec<PathBuf> = fs::read_dir(batch_root)?
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .collect();
        objects.sort();
        Ok(objects)
    }

    fn has_manifest(&self, object: &Path) -> bool {
        inventory::existing_manifest(object, &self.config).is_some()
    }

    fn is_bagged(&self, object: &Path) -> bool {
        bag::is_bagged(object)
    }

    fn has_archive(&self, object: &Path) -> bool {
        archive::archive_path(object, &self.archive_dir, &self.config).is_ok_and(|p| p.exists())
    }
}
