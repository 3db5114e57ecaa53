//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant is fatal: the run must not start until the configuration
/// files are fixed.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration file exists but could not be read or parsed.
    #[display("invalid config file {}: {_1}", _0.display())]
    InvalidFile(#[error(not(source))] PathBuf, #[error(not(source))] String),
    /// The vault must be named in the directory config (never the user config).
    #[display("required property 'vault' is not specified in the directory config")]
    MissingVault,
    /// An access key ID or secret access key is missing from both files.
    #[display("required property '{_0}' is not specified")]
    MissingCredential(#[error(not(source))] &'static str),
    /// A property is present but its value makes no sense.
    #[display("invalid {_0} value '{_1}'")]
    InvalidValue(#[error(not(source))] &'static str, #[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
