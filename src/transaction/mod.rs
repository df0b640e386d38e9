//! Journaled filesystem changes with rollback
//!
//! Bagging and pre-packaging rearrange an object in place. Every rename,
//! created file and created directory is journaled here; if the operation
//! does not reach [`Transaction::commit`], the journal is replayed backwards
//! so the object returns to the layout it had before.
//!
//! ## Usage
//!
//! ```ignore
//! let mut transaction = Transaction::new(&object_dir);
//! transaction.rename(&from, &to)?;
//! transaction.track_file_created(&path);
//!
//! // On success:
//! transaction.commit();
//!
//! // On error (automatic via Drop if not committed):
//! // rollback happens automatically
//! ```


use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PackError, Result};

#[derive(Debug, Clone)]
enum Step {
    Renamed { from: PathBuf, to: PathBuf },
    CreatedFile(PathBuf),
    CreatedDir(PathBuf),
}

/// A transaction over one directory tree
#[derive(Debug)]
pub struct Transaction {
    /// Directory the transaction works on, used in messages
    root: PathBuf,

    /// Completed steps, oldest first
    journal: Vec<Step>,

    /// Whether the transaction has been committed
    committed: bool,

    /// Whether rollback runs on drop (can be disabled for testing)
    rollback_enabled: bool,
}

impl Transaction {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            journal: Vec::new(),
            committed: false,
            rollback_enabled: true,
        }
    }

    /// Rename `from` to `to` and journal it
    pub fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        if to.exists() {
            return Err(PackError::FileWriteFailed {
                path: to.display().to_string(),
                reason: "destination already exists".to_string(),
            });
        }
        fs::rename(from, to).map_err(|e| PackError::FileWriteFailed {
            path: to.display().to_string(),
            reason: format!("could not move {}: {e}", from.display()),
        })?;
        self.journal.push(Step::Renamed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    /// Create a directory and journal it
    pub fn create_dir(&mut self, path: &Path) -> Result<()> {
        fs::create_dir(path).map_err(|e| PackError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.track_dir_created(path);
        Ok(())
    }

    /// Write a new file and journal it
    pub fn write_file(&mut self, path: &Path, content: &[u8]) -> Result<()> {
        if path.exists() {
            return Err(PackError::FileWriteFailed {
                path: path.display().to_string(),
                reason: "file already exists".to_string(),
            });
        }
        fs::write(path, content).map_err(|e| PackError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.track_file_created(path);
        Ok(())
    }

    /// Track a file that was created during this transaction
    pub fn track_file_created(&mut self, path: impl Into<PathBuf>) {
        self.journal.push(Step::CreatedFile(path.into()));
    }

    /// Track a directory that was created during this transaction
    pub fn track_dir_created(&mut self, path: impl Into<PathBuf>) {
        self.journal.push(Step::CreatedDir(path.into()));
    }

    /// Commit the transaction (prevent rollback)
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Undo every journaled step, newest first
    ///
    /// Keeps going after a failed step and reports every step it could not
    /// undo, so the caller can tell the operator exactly what is left over.
    pub fn rollback(&mut self) -> Result<()> {
        if self.committed {
            return Ok(());
        }

        let mut problems = Vec::new();
        while let Some(step) = self.journal.pop() {
            debug!(root = %self.root.display(), ?step, "rolling back");
            let outcome = match &step {
                Step::Renamed { from, to } => fs::rename(to, from),
                Step::CreatedFile(path) => match fs::remove_file(path) {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                },
                // Only removed if empty
                Step::CreatedDir(path) => match fs::remove_dir(path) {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            if let Err(e) = outcome {
                problems.push(format!("{step:?}: {e}"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PackError::IoError {
                message: format!(
                    "rollback of {} incomplete: {}",
                    self.root.display(),
                    problems.join("; ")
                ),
                source: None,
            })
        }
    }

    #[cfg(test)]
    fn disable_rollback(&mut self) {
        self.rollback_enabled = false;
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.committed && self.rollback_enabled {
            // Automatic rollback on drop if not committed
            if let Err(e) = self.rollback() {
                warn!("Rollback failed: {e}");
            }
        }
    }
}
