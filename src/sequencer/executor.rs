//! The work each stage does to one object

use std::path::{Path, PathBuf};

use crate::archive::{self, ArchiveOutcome};
use crate::bag::{self, BagOutcome};
use crate::config::PackConfig;
use crate::error::Result;
use crate::inventory::{self, InventoryOutcome, OverwriteMode};
use crate::prepack::{self, PrepackOutcome};
use crate::transfer;

use super::report::ObjectOutcome;

/// Runs one stage on one object
///
/// An `Err` means the stage failed for this object only; the sequencer
/// records it and moves on to the next object.
pub trait StageExecutor: Sync {
    fn prepack(&self, object: &Path) -> Result<ObjectOutcome>;

    fn manifest(&self, object: &Path, mode: OverwriteMode) -> Result<ObjectOutcome>;

    fn bag(&self, object: &Path, confirmed_rebag: bool) -> Result<ObjectOutcome>;

    fn archive(&self, object: &Path) -> Result<ObjectOutcome>;

    /// Runs once per batch rather than once per object
    fn transfer(&self, batch_root: &Path) -> Result<ObjectOutcome>;
}

/// Executor that works on the real filesystem
#[derive(Debug, Clone)]
pub struct FsExecutor {
    config: PackConfig,
    archive_dir: PathBuf,
}

impl FsExecutor {
    pub fn new(config: PackConfig, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            archive_dir: archive_dir.into(),
        }
    }
}

impl StageExecutor for FsExecutor {
    fn prepack(&self, object: &Path) -> Result<ObjectOutcome> {
        Ok(
            match prepack::prepack_object(object, &self.config.manifest_name)? {
                PrepackOutcome::Nested { moved, .. } => {
                    ObjectOutcome::completed(format!("nested {moved} entries"))
                }
                PrepackOutcome::Skipped { reason } => ObjectOutcome::skipped(reason),
            },
        )
    }

    fn manifest(&self, object: &Path, mode: OverwriteMode) -> Result<ObjectOutcome> {
        Ok(
            match inventory::build_object_manifest(object, &self.config, mode)? {
                InventoryOutcome::Written { build, .. } => {
                    let detail = format!("{} files", build.record.len());
                    if build.is_complete() {
                        ObjectOutcome::completed(detail)
                    } else {
                        ObjectOutcome::Partial {
                            detail,
                            unreadable: build.failures.len(),
                        }
                    }
                }
                InventoryOutcome::Skipped { .. } => ObjectOutcome::skipped("manifest exists"),
            },
        )
    }

    fn bag(&self, object: &Path, confirmed_rebag: bool) -> Result<ObjectOutcome> {
        Ok(
            match bag::bag_object(object, &self.config, confirmed_rebag)? {
                BagOutcome::Bagged(report) if report.is_valid() => ObjectOutcome::completed(
                    format!("{} files, {} bytes", report.payload_files, report.payload_bytes),
                ),
                BagOutcome::Bagged(report) => ObjectOutcome::Invalid {
                    problems: report.validation.problems,
                },
                BagOutcome::AlreadyBagged => ObjectOutcome::declined("already a bag"),
            },
        )
    }

    fn archive(&self, object: &Path) -> Result<ObjectOutcome> {
        Ok(
            match archive::archive_object(object, &self.archive_dir, &self.config)? {
                ArchiveOutcome::Created { path, .. } => {
                    ObjectOutcome::completed(path.display().to_string())
                }
                ArchiveOutcome::SkippedExisting { path } => {
                    ObjectOutcome::skipped(format!("{} exists", path.display()))
                }
            },
        )
    }

    fn transfer(&self, batch_root: &Path) -> Result<ObjectOutcome> {
        let root = transfer::transfer_root_for(batch_root, &self.config)?;
        let manifest = transfer::build_transfer_manifest(&root, &self.config)?;
        let detail = manifest.path.display().to_string();
        Ok(if manifest.failures.is_empty() {
            ObjectOutcome::completed(detail)
        } else {
            ObjectOutcome::Partial {
                detail,
                unreadable: manifest.failures.len(),
            }
        })
    }
}
