//! Configuration errors

use super::PackError;

pub fn not_found(path: impl Into<String>) -> PackError {
    PackError::ConfigNotFound { path: path.into() }
}

pub fn parse_failed(path: impl Into<String>, reason: impl Into<String>) -> PackError {
    PackError::ConfigParseFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

pub fn invalid(message: impl Into<String>) -> PackError {
    PackError::ConfigInvalid {
        message: message.into(),
    }
}
