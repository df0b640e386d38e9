//! Bag validation: payload and tag manifests, completeness, Payload-Oxum

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use rayon::prelude::*;

use super::{BAG_INFO_TXT, BAGIT_TXT, PAYLOAD_DIR, decode_manifest_path};
use crate::error::{PackError, Result};
use crate::hash::{self, DigestAlgorithm, HashOptions};
use crate::walk::{FileWalker, WalkItem};

/// Result of checking a bag
///
/// An invalid bag is a normal outcome, not an error; every problem found is
/// listed so the operator sees all of them at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BagValidation {
    pub files_checked: usize,
    pub problems: Vec<String>,
}

impl BagValidation {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

type Listing = BTreeMap<String, String>;

/// Manifests found next to the payload, keyed by algorithm
fn find_manifests(
    bag_dir: &Path,
    prefix: &str,
    problems: &mut Vec<String>,
) -> Result<Vec<(DigestAlgorithm, Listing)>> {
    let mut found = Vec::new();
    let mut names: Vec<String> = fs::read_dir(bag_dir)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(prefix) && n.ends_with(".txt"))
        .collect();
    names.sort();

    for name in names {
        let alg_name = &name[prefix.len()..name.len() - ".txt".len()];
        let Some(algorithm) = DigestAlgorithm::from_name(alg_name) else {
            problems.push(format!("{name}: unsupported algorithm {alg_name}"));
            continue;
        };
        let content = fs::read_to_string(bag_dir.join(&name)).map_err(|e| {
            PackError::FileReadFailed {
                path: bag_dir.join(&name).display().to_string(),
                reason: e.to_string(),
            }
        })?;
        found.push((algorithm, parse_listing(&name, &content, problems)));
    }
    Ok(found)
}

/// Parse `<digest> <path>` lines
fn parse_listing(name: &str, content: &str, problems: &mut Vec<String>) -> Listing {
    let mut listing = Listing::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once(char::is_whitespace) {
            Some((digest, path)) => {
                let path = decode_manifest_path(path.trim_start());
                listing.insert(path, digest.to_string());
            }
            None => problems.push(format!("{name} line {}: malformed entry", index + 1)),
        }
    }
    listing
}

fn read_oxum(bag_dir: &Path) -> Option<(u64, usize)> {
    let info = fs::read_to_string(bag_dir.join(BAG_INFO_TXT)).ok()?;
    let value = info
        .lines()
        .find_map(|l| l.strip_prefix("Payload-Oxum:"))?
        .trim();
    let (bytes, count) = value.split_once('.')?;
    Some((bytes.parse().ok()?, count.parse().ok()?))
}

/// Check that a bag is complete and every listed digest matches
pub fn validate_bag(bag_dir: &Path, options: HashOptions) -> Result<BagValidation> {
    if !bag_dir.is_dir() {
        return Err(PackError::NotADirectory {
            path: bag_dir.display().to_string(),
        });
    }

    let mut problems = Vec::new();

    match fs::read_to_string(bag_dir.join(BAGIT_TXT)) {
        Ok(content) if content.contains("BagIt-Version:") => {}
        Ok(_) => problems.push(format!("{BAGIT_TXT} has no BagIt-Version")),
        Err(_) => problems.push(format!("{BAGIT_TXT} is missing")),
    }

    let payload = bag_dir.join(PAYLOAD_DIR);
    if !payload.is_dir() {
        problems.push(format!("{PAYLOAD_DIR}/ directory is missing"));
        return Ok(BagValidation {
            files_checked: 0,
            problems,
        });
    }

    let manifests = find_manifests(bag_dir, "manifest-", &mut problems)?;
    if manifests.is_empty() {
        problems.push("no payload manifest found".to_string());
    }
    let tag_manifests = find_manifests(bag_dir, "tagmanifest-", &mut problems)?;

    let mut payload_files: BTreeMap<String, std::path::PathBuf> = BTreeMap::new();
    for item in FileWalker::new(&payload).walk() {
        match item {
            WalkItem::File { path, relative } => {
                payload_files.insert(format!("{PAYLOAD_DIR}/{relative}"), path);
            }
            WalkItem::Symlink { relative, .. } => {
                problems.push(format!("{PAYLOAD_DIR}/{relative}: symbolic link in payload"));
            }
            WalkItem::Unreadable {
                relative, reason, ..
            } => problems.push(format!("{PAYLOAD_DIR}/{relative}: {reason}")),
        }
    }

    let algorithms: Vec<DigestAlgorithm> = manifests.iter().map(|(a, _)| *a).collect();

    for (algorithm, listing) in &manifests {
        let listed: BTreeSet<&String> = listing.keys().collect();
        for path in payload_files.keys() {
            if !listed.contains(path) {
                problems.push(format!(
                    "{path}: not listed in manifest-{}.txt",
                    algorithm.name()
                ));
            }
        }
        for path in listed {
            if !path.starts_with(&format!("{PAYLOAD_DIR}/")) {
                problems.push(format!("{path}: listed outside {PAYLOAD_DIR}/"));
            } else if !payload_files.contains_key(path) {
                problems.push(format!("{path}: listed but missing"));
            }
        }
    }

    let sizes_and_sums: Vec<(String, u64, Result<Vec<String>>)> = payload_files
        .par_iter()
        .map(|(relative, path)| {
            let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            (
                relative.clone(),
                size,
                hash::hash_file_with(path, &algorithms, options),
            )
        })
        .collect();

    let mut total_bytes = 0u64;
    for (relative, size, sums) in &sizes_and_sums {
        total_bytes += size;
        match sums {
            Ok(sums) => {
                for ((algorithm, listing), actual) in manifests.iter().zip(sums) {
                    let Some(expected) = listing.get(relative) else {
                        continue;
                    };
                    if !hash::verify_hash(expected, actual) {
                        problems.push(format!(
                            "{relative}: {} mismatch (expected {expected}, found {actual})",
                            algorithm.name()
                        ));
                    }
                }
            }
            Err(e) => problems.push(format!("{relative}: {e}")),
        }
    }

    match read_oxum(bag_dir) {
        Some((bytes, count)) => {
            if bytes != total_bytes || count != payload_files.len() {
                problems.push(format!(
                    "Payload-Oxum {bytes}.{count} does not match payload {total_bytes}.{}",
                    payload_files.len()
                ));
            }
        }
        None => {
            if bag_dir.join(BAG_INFO_TXT).exists() {
                problems.push(format!("{BAG_INFO_TXT} has no usable Payload-Oxum"));
            }
        }
    }

    for (algorithm, listing) in &tag_manifests {
        for (tag_file, expected) in listing {
            let path = bag_dir.join(tag_file);
            if !path.is_file() {
                problems.push(format!("{tag_file}: listed in tag manifest but missing"));
                continue;
            }
            match hash::hash_file_with(&path, &[*algorithm], options) {
                Ok(sums) => {
                    if sums.first().is_none_or(|actual| !hash::verify_hash(expected, actual)) {
                        problems.push(format!(
                            "{tag_file}: {} mismatch in tag manifest",
                            algorithm.name()
                        ));
                    }
                }
                Err(e) => problems.push(format!("{tag_file}: {e}")),
            }
        }
    }

    Ok(BagValidation {
        files_checked: payload_files.len(),
        problems,
    })
}
