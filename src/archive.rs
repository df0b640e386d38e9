//! One tar archive per object, written next to the batch
//!
//! Archives land in a sibling of the batch directory named
//! `<batch><archive_suffix>`. An archive that already exists is never
//! touched: the new archive is written to a temporary file and only moved
//! into place if the target name is still free.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::GzBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PackConfig;
use crate::error::{PackError, Result};

/// Compression applied to object archives
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    None,
}

impl Compression {
    /// File extension, without the leading dot
    pub fn extension(self) -> &'static str {
        match self {
            Compression::Gzip => "tar.gz",
            Compression::None => "tar",
        }
    }
}

/// What happened to one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Created { path: PathBuf, bytes: u64 },
    /// The archive already existed and was left as it was
    SkippedExisting { path: PathBuf },
}

fn dir_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PackError::NotADirectory {
            path: path.display().to_string(),
        })
}

/// Archive directory for a batch: `<parent>/<batch name><suffix>`
pub fn output_dir_for(batch_root: &Path, config: &PackConfig) -> Result<PathBuf> {
    let name = dir_name(batch_root)?;
    let parent = batch_root.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!("{name}{}", config.archive_suffix)))
}

/// Archive file an object would be written to
pub fn archive_path(object_dir: &Path, output_dir: &Path, config: &PackConfig) -> Result<PathBuf> {
    let name = dir_name(object_dir)?;
    Ok(output_dir.join(format!("{name}.{}", config.compression.extension())))
}

/// Package one object directory into `output_dir`
///
/// Paths inside the archive start with the object's name. File modes and
/// modification times are kept; symbolic links are stored as links.
pub fn archive_object(
    object_dir: &Path,
    output_dir: &Path,
    config: &PackConfig,
) -> Result<ArchiveOutcome> {
    if !object_dir.is_dir() {
        return Err(PackError::NotADirectory {
            path: object_dir.display().to_string(),
        });
    }

    let target = archive_path(object_dir, output_dir, config)?;
    if target.exists() {
        warn!(archive = %target.display(), "archive already exists, leaving it untouched");
        return Ok(ArchiveOutcome::SkippedExisting { path: target });
    }

    let failed = |reason: String| crate::error::archive_failed(target.display().to_string(), reason);

    fs::create_dir_all(output_dir).map_err(|e| failed(e.to_string()))?;

    let temp = tempfile::Builder::new()
        .prefix(".upack-")
        .suffix(".partial")
        .tempfile_in(output_dir)
        .map_err(|e| failed(e.to_string()))?;

    let object_name = dir_name(object_dir)?;
    debug!(object = %object_dir.display(), "writing archive");

    let file = temp.as_file().try_clone().map_err(|e| failed(e.to_string()))?;
    match config.compression {
        Compression::Gzip => {
            let encoder = GzBuilder::new()
                .filename(format!("{object_name}.tar"))
                .write(file, flate2::Compression::default());
            let encoder = write_tar(encoder, &object_name, object_dir).map_err(&failed)?;
            let mut file = encoder.finish().map_err(|e| failed(e.to_string()))?;
            file.flush().map_err(|e| failed(e.to_string()))?;
        }
        Compression::None => {
            let mut file = write_tar(file, &object_name, object_dir).map_err(&failed)?;
            file.flush().map_err(|e| failed(e.to_string()))?;
        }
    }
    temp.as_file().sync_all().map_err(|e| failed(e.to_string()))?;

    match temp.persist_noclobber(&target) {
        Ok(file) => {
            let bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
            info!(archive = %target.display(), bytes, "archive created");
            Ok(ArchiveOutcome::Created {
                path: target.clone(),
                bytes,
            })
        }
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            warn!(archive = %target.display(), "archive appeared while writing, keeping the existing one");
            Ok(ArchiveOutcome::SkippedExisting {
                path: target.clone(),
            })
        }
        Err(e) => Err(failed(e.error.to_string())),
    }
}

fn write_tar<W: Write>(writer: W, object_name: &str, object_dir: &Path) -> std::result::Result<W, String> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);
    builder
        .append_dir_all(object_name, object_dir)
        .map_err(|e| e.to_string())?;
    builder.into_inner().map_err(|e| e.to_string())
}
