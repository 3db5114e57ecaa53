//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A metadata store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A single segment line could not be understood. Skip it; the rest of
    /// the segment (and every other segment) is still usable.
    #[display("invalid record: {_0}")]
    InvalidRecord(#[error(not(source))] String),
    /// Every disambiguator for the current second is already taken. Nothing
    /// sensible can be done except wait, so treat it as fatal.
    #[display("unable to create a segment in {}: all names for {_1} are taken", _0.display())]
    SegmentNamesExhausted(#[error(not(source))] PathBuf, #[error(not(source))] String),
    /// Reading or writing a segment (or the store directory) failed.
    #[display("I/O error on {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::SegmentNamesExhausted(_, _))
    }
}
