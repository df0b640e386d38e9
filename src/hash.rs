//! Streaming content digests for manifests and bags
//!
//! Files are read in fixed-size chunks so memory use does not depend on file
//! size. Several algorithms can be computed in a single pass, which is how
//! bag payload manifests get their MD5 and SHA-512 columns from one read.

use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

use crate::error::{PackError, Result};

/// MD5 of the empty input
pub const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Lowercase name as used in BagIt manifest file names
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// Parse a lowercase algorithm name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "md5" => Some(DigestAlgorithm::Md5),
            "sha256" => Some(DigestAlgorithm::Sha256),
            "sha512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    fn hasher(self) -> StreamHasher {
        match self {
            DigestAlgorithm::Md5 => StreamHasher::Md5(Md5::new()),
            DigestAlgorithm::Sha256 => StreamHasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => StreamHasher::Sha512(Sha512::new()),
        }
    }
}

enum StreamHasher {
    Md5(Md5),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamHasher {
    fn update(&mut self, bytes: &[u8]) {
        match self {
            StreamHasher::Md5(h) => h.update(bytes),
            StreamHasher::Sha256(h) => h.update(bytes),
            StreamHasher::Sha512(h) => h.update(bytes),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            StreamHasher::Md5(h) => hex::encode(h.finalize()),
            StreamHasher::Sha256(h) => hex::encode(h.finalize()),
            StreamHasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Buffer size and retry budget used while hashing
#[derive(Debug, Clone, Copy)]
pub struct HashOptions {
    pub buffer_size: usize,
    pub retries: u32,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            retries: 2,
        }
    }
}

impl From<&crate::config::PackConfig> for HashOptions {
    fn from(config: &crate::config::PackConfig) -> Self {
        Self {
            buffer_size: config.hash_buffer_size,
            retries: config.hash_retries,
        }
    }
}

/// Hash everything a reader yields, once per requested algorithm
///
/// Digests come back in the same order as `algorithms`.
pub fn hash_reader<R: Read>(
    reader: R,
    algorithms: &[DigestAlgorithm],
    buffer_size: usize,
) -> io::Result<Vec<String>> {
    let mut reader = BufReader::with_capacity(buffer_size, reader);
    let mut hashers: Vec<StreamHasher> = algorithms.iter().map(|a| a.hasher()).collect();
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if bytes_read == 0 {
            break;
        }

        for hasher in &mut hashers {
            hasher.update(&buffer[..bytes_read]);
        }
    }

    Ok(hashers.into_iter().map(StreamHasher::finalize_hex).collect())
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
    )
}

/// Hash a file with several algorithms, retrying transient I/O errors
///
/// Each retry reopens the file and starts over; a partial read never
/// contributes to a digest.
pub fn hash_file_with(
    path: &Path,
    algorithms: &[DigestAlgorithm],
    options: HashOptions,
) -> Result<Vec<String>> {
    let mut attempt = 0;
    loop {
        let result = File::open(path)
            .and_then(|file| hash_reader(file, algorithms, options.buffer_size.max(1)));

        match result {
            Ok(digests) => return Ok(digests),
            Err(e) if is_transient(&e) && attempt < options.retries => {
                attempt += 1;
                debug!(path = %path.display(), attempt, "retrying hash after transient error: {e}");
            }
            Err(e) => {
                return Err(PackError::FileReadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// MD5 of a file, as lowercase hex
pub fn md5_file(path: &Path, options: HashOptions) -> Result<String> {
    let mut digests = hash_file_with(path, &[DigestAlgorithm::Md5], options)?;
    digests.pop().ok_or_else(|| crate::error::io_error("digest missing"))
}

/// Verify a digest matches the expected value, ignoring hex case
pub fn verify_hash(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}
