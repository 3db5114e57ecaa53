//! Write-back of a [`Plan`](crate::detect::Plan).
//!
//! Touched records are persisted first, without contacting the archive.
//! Pending uploads follow one at a time, in scan order. Each successful
//! upload is appended to the store immediately, so an interrupted run loses
//! at most the upload in flight. A failed upload is logged and left without
//! a record; the next run sees the file as new or modified again.

use crate::detect::PendingUpload;
use crate::digest::digest_file;
use crate::error::{ErrorKind, Result};
use berg_archive::ArchiveHandle;
use berg_store::{FileRecord, MetadataStore, Segment, Timestamp};
use exn::ResultExt;
use std::future::Future;
use std::num::NonZeroUsize;
use tracing::instrument;

/// Appends records to the store, opening a segment on first use and starting
/// a new one every `segment_size` records.
pub struct SegmentWriter<'a> {
    store: &'a MetadataStore,
    segment_size: NonZeroUsize,
    current: Option<Segment>,
}

impl<'a> SegmentWriter<'a> {
    pub fn new(store: &'a MetadataStore, segment_size: NonZeroUsize) -> Self {
        Self { store, segment_size, current: None }
    }

    pub async fn append(&mut self, record: &FileRecord) -> Result<()> {
        let segment = match self.current.take() {
            Some(segment) if segment.len() < self.segment_size.get() => segment,
            full => {
                if let Some(full) = full {
                    full.close().await.or_raise(|| ErrorKind::Store)?;
                }
                self.store.new_segment().await.or_raise(|| ErrorKind::Store)?
            },
        };
        let segment = self.current.insert(segment);
        segment.append(record).await.or_raise(|| ErrorKind::Store)
    }

    /// Sync and close the open segment, if any.
    pub async fn finish(mut self) -> Result<()> {
        match self.current.take() {
            Some(segment) => segment.close().await.or_raise(|| ErrorKind::Store),
            None => Ok(()),
        }
    }
}

/// Persist metadata-only updates for touched files.
#[instrument(skip_all, fields(count = touched.len()))]
pub async fn persist_touched(store: &MetadataStore, touched: &[FileRecord], segment_size: NonZeroUsize) -> Result<()> {
    let mut writer = SegmentWriter::new(store, segment_size);
    for record in touched {
        writer.append(record).await?;
    }
    writer.finish().await
}

/// Outcome of the upload phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub failed: usize,
}

/// Upload every pending file and record each success.
///
/// `connect` is only called when there is at least one file to upload. Upload
/// failures (and files that cannot be hashed after uploading) are counted
/// and skipped; failing to write the store aborts the phase.
#[instrument(skip_all, fields(count = uploads.len()))]
pub async fn upload_pending<F, Fut>(
    store: &MetadataStore,
    uploads: Vec<PendingUpload>,
    segment_size: NonZeroUsize,
    connect: F,
) -> Result<UploadSummary>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = berg_archive::error::Result<ArchiveHandle>>,
{
    let mut summary = UploadSummary::default();
    if uploads.is_empty() {
        return Ok(summary);
    }
    let archive = connect().await.or_raise(|| ErrorKind::Connect)?;
    tracing::debug!(archive = archive.name(), "Connected to archive");

    let total = uploads.len();
    let mut writer = SegmentWriter::new(store, segment_size);
    for (index, pending) in uploads.into_iter().enumerate() {
        let archive_id = match archive.upload(&pending.path, &pending.name).await {
            Ok(archive_id) => archive_id,
            Err(err) => {
                tracing::warn!(path = %pending.name, "Upload failed, will retry on the next run: {}", *err);
                summary.failed += 1;
                continue;
            },
        };
        let digest = match pending.digest.clone() {
            Some(digest) => digest,
            None => match digest_file(&pending.path).await {
                Ok(digest) => digest,
                Err(err) => {
                    tracing::warn!(path = %pending.name, %archive_id, "Uploaded, but unable to hash: {}", *err);
                    summary.failed += 1;
                    continue;
                },
            },
        };
        let name = pending.name.clone();
        let record = pending.into_record(archive_id, digest, Timestamp::now());
        writer.append(&record).await?;
        summary.uploaded += 1;
        tracing::info!(path = %name, archive_id = %record.archive_id, "[{}/{}] uploaded", index + 1, total);
    }
    writer.finish().await?;
    Ok(summary)
}
