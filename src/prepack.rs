//! Pre-packaging: nest an object's contents under a folder of its own name
//!
//! Bagging moves everything into `data/`. Running this first keeps the
//! department's top-level folder name inside the payload
//! (`obj/data/obj/...`). Metadata files (any file whose name contains
//! `meta`) stay at the object's top level.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::bag;
use crate::error::{PackError, Result};
use crate::transaction::Transaction;

const STAGING_DIR: &str = ".upack-prepack";

/// What happened to one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepackOutcome {
    Nested { target: PathBuf, moved: usize },
    Skipped { reason: String },
}

fn stays_on_top(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().contains("meta"))
}

/// Move an object's contents into `<object>/<object name>/`
pub fn prepack_object(object_dir: &Path, manifest_name: &str) -> Result<PrepackOutcome> {
    if !object_dir.is_dir() {
        return Err(PackError::NotADirectory {
            path: object_dir.display().to_string(),
        });
    }
    let Some(name) = object_dir.file_name().map(|n| n.to_os_string()) else {
        return Err(PackError::NotADirectory {
            path: object_dir.display().to_string(),
        });
    };

    let target = object_dir.join(&name);
    if target.exists() {
        info!(object = %object_dir.display(), "already nested, skipping");
        return Ok(PrepackOutcome::Skipped {
            reason: "already contains a folder of its own name".to_string(),
        });
    }
    if bag::is_bagged(object_dir) {
        info!(object = %object_dir.display(), "already a bag, skipping");
        return Ok(PrepackOutcome::Skipped {
            reason: "already a bag".to_string(),
        });
    }

    let mut entries = crate::walk::list_entries(object_dir)?;
    entries.retain(|p| !stays_on_top(p) && p.file_name().is_some_and(|n| n != manifest_name));

    let staging = object_dir.join(STAGING_DIR);
    let mut transaction = Transaction::new(object_dir);
    transaction.create_dir(&staging)?;
    for entry in &entries {
        if let Some(file_name) = entry.file_name() {
            debug!(entry = %entry.display(), "nesting");
            transaction.rename(entry, &staging.join(file_name))?;
        }
    }
    transaction.rename(&staging, &target)?;
    transaction.commit();

    info!(object = %object_dir.display(), moved = entries.len(), "nested object contents");
    Ok(PrepackOutcome::Nested {
        target,
        moved: entries.len(),
    })
}
