//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The local file could not be opened or read for uploading.
    #[display("unable to read {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The request never got a response (connection, timeout, DNS, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The archive service answered, but refused the request (bad
    /// credentials, unknown vault, throttling, etc.)
    #[display("upload rejected: {_0}")]
    Rejected(#[error(not(source))] String),
    /// The configured proxy is not a usable URI.
    #[display("invalid proxy: {_0}")]
    InvalidProxy(#[error(not(source))] String),
    /// The upload apparently succeeded but no archive ID came back, so there
    /// is nothing to record.
    #[display("archive service returned no archive ID")]
    MissingArchiveId,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::MissingArchiveId)
    }
}
