//! BagIt packaging of digital objects
//!
//! Bagging moves every top-level entry of an object into a `data/`
//! payload directory and writes the tag files next to it:
//! `bagit.txt`, `bag-info.txt`, one `manifest-<alg>.txt` per configured
//! algorithm and matching `tagmanifest-<alg>.txt` files.
//!
//! The move goes through a staging directory and a [`Transaction`]. If any
//! step fails the object is put back as it was. If even that fails, a marker
//! file is left so the object can never pass for a finished bag.

pub mod verify;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::config::PackConfig;
use crate::error::{PackError, Result};
use crate::hash::{self, DigestAlgorithm, HashOptions};
use crate::transaction::Transaction;
use crate::walk::{FileWalker, WalkItem};

pub use verify::{BagValidation, validate_bag};

/// Payload directory name; its presence is what makes a directory a bag
pub const PAYLOAD_DIR: &str = "data";

/// Bag declaration file
pub const BAGIT_TXT: &str = "bagit.txt";

/// Bag metadata file
pub const BAG_INFO_TXT: &str = "bag-info.txt";

/// Directory the payload is assembled in before it becomes `data/`
pub const STAGING_DIR: &str = ".upack-bagging";

/// Left behind when a failed bagging attempt could not be undone
pub const INCOMPLETE_MARKER: &str = ".upack-bag-incomplete";

const BAGIT_VERSION: &str = "0.97";

/// A directory is a bag when it directly contains `data/`
pub fn is_bagged(object_dir: &Path) -> bool {
    object_dir.join(PAYLOAD_DIR).is_dir()
}

/// Whether an earlier bagging attempt stopped half way
pub fn is_incomplete(object_dir: &Path) -> bool {
    object_dir.join(STAGING_DIR).exists() || object_dir.join(INCOMPLETE_MARKER).exists()
}

/// Name of the payload manifest for an algorithm
pub fn manifest_file_name(algorithm: DigestAlgorithm) -> String {
    format!("manifest-{}.txt", algorithm.name())
}

/// Name of the tag manifest for an algorithm
pub fn tagmanifest_file_name(algorithm: DigestAlgorithm) -> String {
    format!("tagmanifest-{}.txt", algorithm.name())
}

/// Encode a path for a BagIt manifest line
pub fn encode_manifest_path(path: &str) -> String {
    path.replace('%', "%25")
        .replace('\n', "%0A")
        .replace('\r', "%0D")
}

/// Reverse of [`encode_manifest_path`]
pub fn decode_manifest_path(path: &str) -> String {
    path.replace("%0A", "\n")
        .replace("%0a", "\n")
        .replace("%0D", "\r")
        .replace("%0d", "\r")
        .replace("%25", "%")
}

/// Summary of a finished bag
#[derive(Debug, Clone)]
pub struct BagReport {
    pub path: PathBuf,
    pub payload_files: usize,
    pub payload_bytes: u64,
    pub algorithms: Vec<DigestAlgorithm>,
    pub validation: BagValidation,
}

impl BagReport {
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }
}

/// What happened to one object
#[derive(Debug)]
pub enum BagOutcome {
    Bagged(BagReport),
    /// The object already has `data/` and re-bagging was not confirmed
    AlreadyBagged,
}

/// Turn an object directory into a bag
///
/// `confirm_rebag` is the explicit go-ahead for objects that are already
/// bags; without it such an object is left untouched.
pub fn bag_object(
    object_dir: &Path,
    config: &PackConfig,
    confirm_rebag: bool,
) -> Result<BagOutcome> {
    if !object_dir.is_dir() {
        return Err(PackError::NotADirectory {
            path: object_dir.display().to_string(),
        });
    }

    let name = object_name(object_dir);

    if is_incomplete(object_dir) {
        return Err(crate::error::bag_failed(
            &name,
            format!(
                "an earlier bagging attempt did not finish; inspect and remove {STAGING_DIR} or {INCOMPLETE_MARKER}"
            ),
        ));
    }

    if is_bagged(object_dir) {
        if !confirm_rebag {
            info!(object = %name, "already a bag, leaving it untouched");
            return Ok(BagOutcome::AlreadyBagged);
        }
        warn!(object = %name, "re-bagging an existing bag; its payload will be nested");
    }

    let mut transaction = Transaction::new(object_dir);
    match assemble(&mut transaction, object_dir, config) {
        Ok(report) => {
            transaction.commit();
            if report.is_valid() {
                info!(object = %name, files = report.payload_files, "bag created");
            } else {
                warn!(object = %name, problems = ?report.validation.problems, "bag created but not valid");
            }
            Ok(BagOutcome::Bagged(report))
        }
        Err(e) => {
            let reason = match transaction.rollback() {
                Ok(()) => format!("{e}; object restored"),
                Err(rollback_err) => {
                    let _ = fs::write(
                        object_dir.join(INCOMPLETE_MARKER),
                        format!("{e}\n{rollback_err}\n"),
                    );
                    error!(object = %name, "bag rollback incomplete: {rollback_err}");
                    format!("{e}; rollback incomplete ({rollback_err}), see {INCOMPLETE_MARKER}")
                }
            };
            Err(crate::error::bag_failed(&name, reason))
        }
    }
}

fn object_name(object_dir: &Path) -> String {
    object_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| object_dir.display().to_string())
}

fn assemble(
    transaction: &mut Transaction,
    object_dir: &Path,
    config: &PackConfig,
) -> Result<BagReport> {
    let staging = object_dir.join(STAGING_DIR);
    transaction.create_dir(&staging)?;

    let mut top_level = crate::walk::list_entries(object_dir)?;
    top_level.retain(|p| p != &staging);

    for entry in &top_level {
        if let Some(file_name) = entry.file_name() {
            transaction.rename(entry, &staging.join(file_name))?;
        }
    }

    let payload = object_dir.join(PAYLOAD_DIR);
    transaction.rename(&staging, &payload)?;

    let algorithms = config.bag_algorithms.clone();
    let digests = hash_payload(&payload, &algorithms, HashOptions::from(config))?;
    let payload_bytes: u64 = digests.values().map(|(size, _)| size).sum();

    for (index, algorithm) in algorithms.iter().enumerate() {
        let mut body = String::new();
        for (path, (_, sums)) in &digests {
            body.push_str(&format!(
                "{}  {}/{}\n",
                sums[index],
                PAYLOAD_DIR,
                encode_manifest_path(path)
            ));
        }
        transaction.write_file(&object_dir.join(manifest_file_name(*algorithm)), body.as_bytes())?;
    }

    transaction.write_file(
        &object_dir.join(BAGIT_TXT),
        format!("BagIt-Version: {BAGIT_VERSION}\nTag-File-Character-Encoding: UTF-8\n").as_bytes(),
    )?;

    let mut info = String::new();
    info.push_str(&format!("Bag-Software-Agent: {}\n", config.bag_software_agent));
    info.push_str(&format!(
        "Bagging-Date: {}\n",
        chrono::Local::now().format("%Y-%m-%d")
    ));
    info.push_str(&format!("Payload-Oxum: {}.{}\n", payload_bytes, digests.len()));
    for (key, value) in &config.bag_info {
        info.push_str(&format!("{key}: {value}\n"));
    }
    transaction.write_file(&object_dir.join(BAG_INFO_TXT), info.as_bytes())?;

    write_tag_manifests(transaction, object_dir, &algorithms, HashOptions::from(config))?;

    let validation = validate_bag(object_dir, HashOptions::from(config))?;

    Ok(BagReport {
        path: object_dir.to_path_buf(),
        payload_files: digests.len(),
        payload_bytes,
        algorithms,
        validation,
    })
}

/// Size and per-algorithm digests for every payload file, keyed by path
/// relative to `data/`
fn hash_payload(
    payload: &Path,
    algorithms: &[DigestAlgorithm],
    options: HashOptions,
) -> Result<BTreeMap<String, (u64, Vec<String>)>> {
    let items: Vec<WalkItem> = FileWalker::new(payload).walk().collect();

    items
        .into_par_iter()
        .map(|item| match item {
            WalkItem::File { path, relative } => {
                let size = fs::metadata(&path)?.len();
                let sums = hash::hash_file_with(&path, algorithms, options)?;
                Ok((relative, (size, sums)))
            }
            WalkItem::Symlink { relative, .. } => Err(crate::error::io_error(format!(
                "payload contains symbolic link {relative}"
            ))),
            WalkItem::Unreadable { relative, reason, .. } => Err(PackError::FileReadFailed {
                path: relative,
                reason,
            }),
        })
        .collect()
}

fn write_tag_manifests(
    transaction: &mut Transaction,
    object_dir: &Path,
    algorithms: &[DigestAlgorithm],
    options: HashOptions,
) -> Result<()> {
    let mut tag_files = vec![BAGIT_TXT.to_string(), BAG_INFO_TXT.to_string()];
    tag_files.extend(algorithms.iter().map(|a| manifest_file_name(*a)));
    tag_files.sort();

    let mut bodies = vec![String::new(); algorithms.len()];
    for tag_file in &tag_files {
        let sums = hash::hash_file_with(&object_dir.join(tag_file), algorithms, options)?;
        for (body, sum) in bodies.iter_mut().zip(sums) {
            body.push_str(&format!("{sum}  {tag_file}\n"));
        }
    }

    for (algorithm, body) in algorithms.iter().zip(bodies) {
        transaction.write_file(
            &object_dir.join(tagmanifest_file_name(*algorithm)),
            body.as_bytes(),
        )?;
    }
    Ok(())
}
