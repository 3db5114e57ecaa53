//! Incremental backup of a directory tree into a cold archive.
//!
//! A run goes through three steps:
//!
//! 1. [`scan`](scan::scan) the backup root,
//! 2. [`detect`](detect::detect) what changed since the last run, using the
//!    metadata store in the root's reserved directory,
//! 3. persist touched files and [upload](upload::upload_pending) new and
//!    modified ones.
//!
//! Running [`backup()`] twice on an unchanged tree uploads nothing the second
//! time, and never reads file contents.

mod digest;

pub mod detect;
pub mod error;
pub mod scan;
pub mod upload;

use crate::detect::Change;
use crate::error::{ErrorKind, Result};
use berg_archive::ArchiveHandle;
use berg_config::RESERVED_DIR;
use berg_store::MetadataStore;
use exn::ResultExt;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::instrument;

/// Per-run counts, logged when a run completes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackupReport {
    pub new: usize,
    pub modified: usize,
    pub touched: usize,
    pub unchanged: usize,
    /// Files that could not be scanned or hashed.
    pub skipped: usize,
    pub uploaded: usize,
    /// Uploads that failed; retried on the next run.
    pub failed: usize,
}

impl fmt::Display for BackupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} new, {} modified, {} touched, {} unchanged, {} skipped; {} uploaded, {} failed",
            self.new, self.modified, self.touched, self.unchanged, self.skipped, self.uploaded, self.failed
        )
    }
}

/// Back up every file below `root`.
///
/// Records go to the metadata store in `<root>/.berg`. The archive is only
/// connected to (by calling `connect`) when something has to be uploaded.
///
/// # Errors
/// - [`InvalidRoot`](ErrorKind::InvalidRoot) if `root` cannot be listed.
/// - [`Store`](ErrorKind::Store) if the metadata store cannot be read or
///   written.
/// - [`Connect`](ErrorKind::Connect) if `connect` fails.
///
/// Problems with individual files are logged and counted in the report
/// instead.
#[instrument(skip(root, connect), fields(root = %root.display()))]
pub async fn backup<F, Fut>(root: &Path, segment_size: NonZeroUsize, connect: F) -> Result<BackupReport>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = berg_archive::error::Result<ArchiveHandle>>,
{
    tokio::fs::read_dir(root).await.or_raise(|| ErrorKind::InvalidRoot(root.to_path_buf()))?;

    let store = MetadataStore::new(root.join(RESERVED_DIR));
    let view = store.load().await.or_raise(|| ErrorKind::Store)?;
    let plan = detect::detect(&view, scan::scan(root)).await;

    let mut report = BackupReport {
        new: plan.count(Change::New),
        modified: plan.count(Change::Modified),
        touched: plan.count(Change::Touched),
        unchanged: plan.count(Change::Unchanged),
        skipped: plan.skipped,
        ..BackupReport::default()
    };
    tracing::info!(
        new = report.new,
        modified = report.modified,
        touched = report.touched,
        unchanged = report.unchanged,
        skipped = report.skipped,
        "Scan complete"
    );

    upload::persist_touched(&store, &plan.touched, segment_size).await?;
    let summary = upload::upload_pending(&store, plan.uploads, segment_size, connect).await?;
    report.uploaded = summary.uploaded;
    report.failed = summary.failed;

    tracing::info!(%report, "Backup complete");
    Ok(report)
}
