//! Configuration file handling for UPack
//!
//! The configuration file is optional YAML. Every field has a default, so an
//! empty file (or no file) yields a working setup. Command-line flags are
//! applied on top of the loaded values by the command wrappers.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::archive::Compression;
use crate::error::{PackError, Result};
use crate::hash::DigestAlgorithm;

/// Environment variable naming a configuration file
pub const CONFIG_ENV: &str = "UPACK_CONFIG";

/// Default name of the per-object inventory file
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.csv";

/// Batch-wide settings for every pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    /// File name of the object manifest written at each object's top level
    pub manifest_name: String,

    /// File names never listed in any manifest
    pub ignore_names: Vec<String>,

    /// Read buffer size used while hashing
    pub hash_buffer_size: usize,

    /// Extra attempts made when a transient I/O error interrupts hashing
    pub hash_retries: u32,

    /// Payload manifests written into every bag
    pub bag_algorithms: Vec<DigestAlgorithm>,

    /// Value of the `Bag-Software-Agent` field in `bag-info.txt`
    pub bag_software_agent: String,

    /// Additional `bag-info.txt` fields, written in order
    pub bag_info: Vec<(String, String)>,

    /// Compression applied to object archives
    pub compression: Compression,

    /// Suffix appended to the batch directory name to form the archive directory
    pub archive_suffix: String,

    /// Extension of transfer manifest files
    pub transfer_extension: String,

    /// Worker threads for hashing; 0 lets rayon decide
    pub threads: usize,

    /// Text for the final comment row of every object manifest
    pub object_comment: String,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            ignore_names: vec![".DS_Store".to_string()],
            hash_buffer_size: 8192,
            hash_retries: 2,
            bag_algorithms: vec![DigestAlgorithm::Md5, DigestAlgorithm::Sha512],
            bag_software_agent: format!("upack v{}", env!("CARGO_PKG_VERSION")),
            bag_info: Vec::new(),
            compression: Compression::Gzip,
            archive_suffix: "-tarred".to_string(),
            transfer_extension: "csv".to_string(),
            threads: 0,
            object_comment: String::new(),
        }
    }
}

impl PackConfig {
    /// Parse a configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, which must exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PackError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| PackError::FileReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&content).map_err(|e| match e {
            PackError::ConfigParseFailed { reason, .. } => PackError::ConfigParseFailed {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Load from an explicit path if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Check invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        let name = self.manifest_name.trim();
        if name.is_empty() {
            return Err(crate::error::config_invalid("manifest_name must not be empty"));
        }
        if name.contains('/') || name.contains('\\') || name == "data" {
            return Err(crate::error::config_invalid(format!(
                "manifest_name '{}' must be a plain file name other than 'data'",
                self.manifest_name
            )));
        }
        if self.bag_algorithms.is_empty() {
            return Err(crate::error::config_invalid(
                "bag_algorithms needs at least one algorithm",
            ));
        }
        if self.hash_buffer_size == 0 {
            return Err(crate::error::config_invalid("hash_buffer_size must be positive"));
        }
        if self.archive_suffix.is_empty() {
            return Err(crate::error::config_invalid("archive_suffix must not be empty"));
        }
        Ok(())
    }
}
