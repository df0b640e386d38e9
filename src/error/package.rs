//! Bag, archive and manifest errors

use super::PackError;

/// Creates a bag failed error for an object
pub fn bag_failed(object: impl Into<String>, reason: impl Into<String>) -> PackError {
    PackError::BagFailed {
        object: object.into(),
        reason: reason.into(),
    }
}

/// Creates a bag invalid error listing every problem found
pub fn bag_invalid(path: impl Into<String>, problems: Vec<String>) -> PackError {
    PackError::BagInvalid {
        path: path.into(),
        problems,
    }
}

pub fn archive_failed(path: impl Into<String>, reason: impl Into<String>) -> PackError {
    PackError::ArchiveFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

pub fn manifest_parse_failed(path: impl Into<String>, reason: impl Into<String>) -> PackError {
    PackError::ManifestParseFailed {
        path: path.into(),
        reason: reason.into(),
    }
}
