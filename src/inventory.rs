//! Per-object inventory: one manifest file at each object's top level
//!
//! The manifest lists every file under the object except the manifest
//! itself. It is written to a temporary file in the object directory and
//! renamed into place, so an interrupted run never leaves half a manifest.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::PackConfig;
use crate::error::{PackError, Result};
use crate::hash::HashOptions;
use crate::manifest::{ManifestBuild, build_manifest};
use crate::walk::FileWalker;

/// Batch-wide answer to "a manifest already exists"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    /// Leave existing manifests alone and skip those objects
    #[default]
    KeepExisting,
    /// Regenerate every manifest
    OverwriteAll,
}

/// What happened to one object
#[derive(Debug)]
pub enum InventoryOutcome {
    Written { path: PathBuf, build: ManifestBuild },
    Skipped { existing: PathBuf },
}

/// Where the manifest of an unbagged object lives
pub fn manifest_path(object_dir: &Path, config: &PackConfig) -> PathBuf {
    object_dir.join(&config.manifest_name)
}

/// An existing manifest, either at the top level or inside a bag payload
pub fn existing_manifest(object_dir: &Path, config: &PackConfig) -> Option<PathBuf> {
    [
        manifest_path(object_dir, config),
        object_dir.join(crate::bag::PAYLOAD_DIR).join(&config.manifest_name),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

/// Write text to `target` through a temporary sibling and a rename
pub fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let dir = target.parent().ok_or_else(|| PackError::FileWriteFailed {
        path: target.display().to_string(),
        reason: "no parent directory".to_string(),
    })?;
    let write_err = |e: std::io::Error| PackError::FileWriteFailed {
        path: target.display().to_string(),
        reason: e.to_string(),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".upack-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(target).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Build and write the manifest for one object
pub fn build_object_manifest(
    object_dir: &Path,
    config: &PackConfig,
    mode: OverwriteMode,
) -> Result<InventoryOutcome> {
    if !object_dir.is_dir() {
        return Err(PackError::NotADirectory {
            path: object_dir.display().to_string(),
        });
    }

    if let Some(existing) = existing_manifest(object_dir, config) {
        if mode == OverwriteMode::KeepExisting || crate::bag::is_bagged(object_dir) {
            info!(object = %object_dir.display(), "manifest already exists, skipping");
            return Ok(InventoryOutcome::Skipped { existing });
        }
        debug!(object = %object_dir.display(), "overwriting existing manifest");
    }

    let walker = FileWalker::new(object_dir)
        .exclude(config.manifest_name.clone())
        .ignore_names(&config.ignore_names);
    let build = build_manifest(&walker, HashOptions::from(config), &config.object_comment);

    let path = manifest_path(object_dir, config);
    write_atomic(&path, &build.record.to_inventory_csv())?;
    info!(
        object = %object_dir.display(),
        files = build.record.len(),
        failures = build.failures.len(),
        "wrote manifest"
    );

    Ok(InventoryOutcome::Written { path, build })
}
