//! Change detection.
//!
//! Compares each [`ScannedFile`] against the store's view and decides what,
//! if anything, has to happen to it:
//!
//! | Store record | Modification time | Content  | Result              |
//! |--------------|-------------------|----------|---------------------|
//! | none         |                   |          | [`Change::New`]       |
//! | present      | unchanged         | not read | [`Change::Unchanged`] |
//! | present      | changed           | differs  | [`Change::Modified`]  |
//! | present      | changed           | same     | [`Change::Touched`]   |
//!
//! Content is only hashed when the modification time moved, and at most once
//! per file. A plain re-scan of an unchanged tree therefore never reads file
//! contents.

use crate::digest::digest_file;
use crate::error::Result;
use crate::scan::ScannedFile;
use berg_store::{FileRecord, Timestamp, View};
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use std::pin::pin;

/// Classification of a scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Never uploaded before.
    New,
    /// Content differs from the last upload.
    Modified,
    /// Modification time changed but content is identical.
    Touched,
    /// Modification time matches the last upload.
    Unchanged,
}

/// A file that needs uploading.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub name: String,
    pub path: PathBuf,
    pub modified_time: Timestamp,
    /// Already known for [`Change::Modified`] files; computed after the
    /// upload for [`Change::New`] files.
    pub digest: Option<String>,
    /// Either [`Change::New`] or [`Change::Modified`].
    pub change: Change,
}

impl PendingUpload {
    /// The record to persist once the archive accepted the file.
    pub fn into_record(self, archive_id: String, digest: String, backup_time: Timestamp) -> FileRecord {
        FileRecord {
            name: self.name,
            archive_id,
            modified_time: self.modified_time,
            backup_time,
            digest,
        }
    }
}

/// Outcome of classifying a single file.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Upload(PendingUpload),
    Touch(FileRecord),
    Unchanged,
}

/// Everything a backup run has to do, in scan order.
#[derive(Debug, Default)]
pub struct Plan {
    pub uploads: Vec<PendingUpload>,
    pub touched: Vec<FileRecord>,
    pub unchanged: usize,
    /// Files that could not be scanned or hashed. Reconsidered next run.
    pub skipped: usize,
}

impl Plan {
    pub fn count(&self, change: Change) -> usize {
        match change {
            Change::Touched => self.touched.len(),
            Change::Unchanged => self.unchanged,
            upload => self.uploads.iter().filter(|pending| pending.change == upload).count(),
        }
    }
}

/// Classify one file against its stored record (if any).
pub async fn classify(existing: Option<&FileRecord>, file: ScannedFile) -> Result<Classified> {
    let Some(existing) = existing else {
        tracing::info!(path = %file.name, modified_time = %file.modified_time, "New file");
        return Ok(Classified::Upload(PendingUpload {
            name: file.name,
            path: file.path,
            modified_time: file.modified_time,
            digest: None,
            change: Change::New,
        }));
    };
    if file.modified_time.is_close_to(existing.modified_time) {
        tracing::debug!(path = %file.name, "Unmodified file");
        return Ok(Classified::Unchanged);
    }
    tracing::debug!(
        path = %file.name,
        old = %existing.modified_time,
        new = %file.modified_time,
        "Modification time changed"
    );
    let digest = digest_file(&file.path).await?;
    if digest == existing.digest {
        tracing::info!(path = %file.name, "Modification time updated, but content is the same");
        return Ok(Classified::Touch(existing.touched(file.modified_time)));
    }
    tracing::info!(path = %file.name, "Modified file");
    Ok(Classified::Upload(PendingUpload {
        name: file.name,
        path: file.path,
        modified_time: file.modified_time,
        digest: Some(digest),
        change: Change::Modified,
    }))
}

/// Classify every scanned file and collect the work to do.
///
/// Files that fail to scan or hash are logged and skipped; they will be
/// looked at again by the next run.
pub async fn detect(view: &View, files: impl Stream<Item = Result<ScannedFile>>) -> Plan {
    let mut files = pin!(files);
    let mut plan = Plan::default();
    while let Some(file) = files.next().await {
        let classified = match file {
            Ok(file) => classify(view.get(&file.name), file).await,
            Err(err) => Err(err),
        };
        match classified {
            Ok(Classified::Upload(pending)) => plan.uploads.push(pending),
            Ok(Classified::Touch(record)) => plan.touched.push(record),
            Ok(Classified::Unchanged) => plan.unchanged += 1,
            Err(err) => {
                tracing::warn!("Skipping file: {}", *err);
                plan.skipped += 1;
            },
        }
    }
    plan
}
