//! Archive trait and implementations.
//!
//! This module defines the [`ArchiveStore`] trait: the single capability the
//! backup process needs from a remote cold-archive service. Implementations
//! are gated behind features (`glacier` for Amazon S3 Glacier vaults, `mock`
//! for an in-memory implementation used in tests).

#[cfg(feature = "glacier")]
mod glacier;
#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "glacier")]
pub use self::glacier::GlacierArchive;
#[cfg(feature = "mock")]
pub use self::mock::{MockArchive, MockUpload};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Write-once remote storage for file contents.
///
/// Archives are opaque: once uploaded, content is only identified by the
/// archive ID returned from [`upload()`](Self::upload). There is no way to
/// list, overwrite or (here) retrieve an archive.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// # use berg_archive::{ArchiveStore, error::Result};
/// # async fn example(archive: &dyn ArchiveStore) -> Result<()> {
/// let archive_id = archive.upload(Path::new("/home/me/photos/beach.jpg"), "photos/beach.jpg").await?;
/// println!("stored as {archive_id}");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Name of the archive target (used for logging only).
    fn name(&self) -> &str;

    /// Upload the file at `path` (absolute) and return its archive ID.
    ///
    /// The `description` is stored alongside the archive by the service; the
    /// backup process uses the file's path relative to the backup root.
    ///
    /// # Notes
    /// - Implementations must stream the file rather than read it into
    ///   memory.
    /// - Returns [`Io`](crate::error::ErrorKind::Io) if the local file cannot
    ///   be read, [`Network`](crate::error::ErrorKind::Network) or
    ///   [`Rejected`](crate::error::ErrorKind::Rejected) if the transfer
    ///   fails.
    async fn upload(&self, path: &Path, description: &str) -> Result<String>;
}
