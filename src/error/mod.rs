//! Error types and handling for UPack
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`fs`]: File system errors
//! - [`config`]: Configuration errors
//! - [`package`]: Bag, archive and manifest errors
//!
//! Skips, conflicts and unreadable files are not errors here: they travel as
//! outcome values so that one object or one file never aborts a batch. Only
//! an integrity mismatch is fatal at the batch level.

#![allow(dead_code, unused_assignments)]

pub mod config;
pub mod fs;
pub mod package;


#[allow(unused_imports)]
pub use config::{
    invalid as config_invalid, not_found as config_not_found, parse_failed as config_parse_failed,
};
#[allow(unused_imports)]
pub use fs::{
    io_error, not_found as file_not_found, read_failed as file_read_failed,
    write_failed as file_write_failed,
};
#[allow(unused_imports)]
pub use package::{archive_failed, bag_failed, bag_invalid, manifest_parse_failed};

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for UPack operations
#[derive(Error, Diagnostic, Debug)]
pub enum PackError {
    // Batch errors
    #[error("Batch directory not found: {path}")]
    #[diagnostic(
        code(upack::batch::not_found),
        help("Pass the folder that contains the digital objects")
    )]
    BatchNotFound { path: String },

    #[error("Not a directory: {path}")]
    #[diagnostic(code(upack::batch::not_a_directory))]
    NotADirectory { path: String },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    #[diagnostic(code(upack::config::not_found))]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration file: {path}")]
    #[diagnostic(code(upack::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(upack::config::invalid))]
    ConfigInvalid { message: String },

    // File system errors
    #[error("File not found: {path}")]
    #[diagnostic(code(upack::fs::not_found))]
    FileNotFound { path: String },

    #[error("Failed to read file: {path}")]
    #[diagnostic(code(upack::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}")]
    #[diagnostic(code(upack::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(upack::fs::io_error))]
    IoError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Manifest errors
    #[error("Failed to parse manifest {path}: {reason}")]
    #[diagnostic(code(upack::manifest::parse_failed))]
    ManifestParseFailed { path: String, reason: String },

    // Bag errors
    #[error("Bagging failed for {object}: {reason}")]
    #[diagnostic(
        code(upack::bag::failed),
        help("The object was restored to its original layout unless noted otherwise")
    )]
    BagFailed { object: String, reason: String },

    #[error("Bag is not valid: {path}")]
    #[diagnostic(code(upack::bag::invalid))]
    BagInvalid { path: String, problems: Vec<String> },

    // Archive errors
    #[error("Failed to create archive {path}: {reason}")]
    #[diagnostic(code(upack::archive::failed))]
    ArchiveFailed { path: String, reason: String },

    // Integrity errors
    #[error(
        "Transfer manifests differ: {} missing, {} added, {} changed, {} unverified",
        missing.len(),
        added.len(),
        changed.len(),
        unverified.len()
    )]
    #[diagnostic(
        code(upack::integrity::mismatch),
        help(
            "Files were lost, altered or unreadable in transit. Do not delete the source copy."
        )
    )]
    IntegrityMismatch {
        missing: Vec<String>,
        added: Vec<String>,
        changed: Vec<String>,
        unverified: Vec<String>,
    },

    // Operator errors
    #[error("Failed to read operator input: {message}")]
    #[diagnostic(code(upack::prompt::failed))]
    PromptFailed { message: String },

    #[error("Stopped by operator before stage {stage}")]
    #[diagnostic(
        code(upack::pipeline::aborted),
        help("Stages that finished before the stop kept their results")
    )]
    StageAborted { stage: String },
}

impl From<std::io::Error> for PackError {
    fn from(err: std::io::Error) -> Self {
        PackError::IoError {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<walkdir::Error> for PackError {
    fn from(err: walkdir::Error) -> Self {
        PackError::IoError {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for PackError {
    fn from(err: serde_yaml::Error) -> Self {
        PackError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PackError {
    fn from(err: serde_json::Error) -> Self {
        PackError::IoError {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<inquire::InquireError> for PackError {
    fn from(err: inquire::InquireError) -> Self {
        PackError::PromptFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, PackError>;
