//! Backup Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A backup error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for backup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a backup failure.
///
/// [`InvalidRoot`](Self::InvalidRoot), [`Store`](Self::Store) and
/// [`Connect`](Self::Connect) abort a run. The others only affect a single
/// file, which is skipped until the next run.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The backup root does not exist, is not a directory, or is unreadable.
    #[display("invalid backup root: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// A directory below the root could not be listed.
    #[display("unable to read directory {}", _0.display())]
    ReadDir(#[error(not(source))] PathBuf),
    /// A file's metadata or contents could not be read.
    #[display("unable to read file {}", _0.display())]
    ReadFile(#[error(not(source))] PathBuf),
    /// The file name cannot be represented in the metadata store (not UTF-8,
    /// or contains a tab or newline).
    #[display("unsupported file name: {}", _0.display())]
    UnsupportedName(#[error(not(source))] PathBuf),
    /// Loading or appending to the [metadata store](berg_store) failed.
    #[display("metadata store error")]
    Store,
    /// Setting up the [archive](berg_archive) connection failed.
    #[display("unable to connect to the archive")]
    Connect,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadDir(_) | Self::ReadFile(_) | Self::Connect)
    }
}
