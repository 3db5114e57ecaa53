use crate::FileRecord;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// File extension shared by every segment.
pub const SEGMENT_EXTENSION: &str = ".db";
/// Disambiguators available per second (`00` to `99`).
const MAX_SEGMENTS_PER_SECOND: u8 = 100;
const STAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// An open, append-only segment.
///
/// Every appended record is flushed before [`append()`](Self::append)
/// returns; a crash can therefore lose at most the record being written.
/// Segments are never reopened once closed.
#[derive(Debug)]
pub struct Segment {
    name: String,
    path: PathBuf,
    file: File,
    records: usize,
}

impl Segment {
    /// Create a new segment in `dir`, named after the current UTC second.
    pub(crate) async fn create(dir: &Path) -> Result<Self> {
        Self::create_at(dir, OffsetDateTime::now_utc()).await
    }

    /// Probes `<stamp>.00.db`, `<stamp>.01.db`, ... until one can be created
    /// exclusively.
    pub(crate) async fn create_at(dir: &Path, now: OffsetDateTime) -> Result<Self> {
        let stamp = now.format(STAMP_FORMAT).or_raise(|| ErrorKind::Io(dir.to_path_buf()))?;
        for disambiguator in 0..MAX_SEGMENTS_PER_SECOND {
            let name = format!("{stamp}.{disambiguator:02}{SEGMENT_EXTENSION}");
            let path = dir.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    tracing::debug!(segment = %name, "Created segment");
                    return Ok(Self { name, path, file, records: 0 });
                },
                Err(err) if err.kind() == IoErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err).or_raise(|| ErrorKind::Io(path)),
            }
        }
        exn::bail!(ErrorKind::SegmentNamesExhausted(dir.to_path_buf(), stamp))
    }

    /// File name of the segment (relative to the store directory).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Append one record as a single newline-terminated line.
    pub async fn append(&mut self, record: &FileRecord) -> Result<()> {
        let line = format!("{record}\n");
        self.file.write_all(line.as_bytes()).await.or_raise(|| ErrorKind::Io(self.path.clone()))?;
        self.file.flush().await.or_raise(|| ErrorKind::Io(self.path.clone()))?;
        self.records += 1;
        Ok(())
    }

    /// Flush the segment to stable storage and release the file handle.
    pub async fn close(mut self) -> Result<()> {
        self.file.flush().await.or_raise(|| ErrorKind::Io(self.path.clone()))?;
        self.file.sync_all().await.or_raise(|| ErrorKind::Io(self.path.clone()))?;
        tracing::debug!(segment = %self.name, records = self.records, "Closed segment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;
    use time::macros::datetime;

    fn record(name: &str) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            archive_id: format!("archive-{name}"),
            modified_time: Timestamp::from_secs(10.0),
            backup_time: Timestamp::from_secs(20.0),
            digest: "0".repeat(crate::DIGEST_HEX_LEN),
        }
    }

    #[tokio::test]
    async fn test_name_pattern() {
        let temp_dir = tempfile::tempdir().unwrap();
        let segment = Segment::create_at(temp_dir.path(), datetime!(2024-01-02 03:04:05 UTC)).await.unwrap();
        assert_eq!(segment.name(), "20240102_030405.00.db");
        assert!(temp_dir.path().join("20240102_030405.00.db").is_file());
    }

    #[tokio::test]
    async fn test_collisions_increment_disambiguator() {
        let temp_dir = tempfile::tempdir().unwrap();
        let now = datetime!(2024-01-02 03:04:05 UTC);
        let first = Segment::create_at(temp_dir.path(), now).await.unwrap();
        let second = Segment::create_at(temp_dir.path(), now).await.unwrap();
        let third = Segment::create_at(temp_dir.path(), now).await.unwrap();
        assert_eq!(first.name(), "20240102_030405.00.db");
        assert_eq!(second.name(), "20240102_030405.01.db");
        assert_eq!(third.name(), "20240102_030405.02.db");
        // Lexicographic order is creation order.
        assert!(first.name() < second.name() && second.name() < third.name());
    }

    #[tokio::test]
    async fn test_exhausted_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        for n in 0..100 {
            std::fs::write(temp_dir.path().join(format!("20240102_030405.{n:02}.db")), b"").unwrap();
        }
        let err = Segment::create_at(temp_dir.path(), datetime!(2024-01-02 03:04:05 UTC)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::SegmentNamesExhausted(_, stamp) if stamp == "20240102_030405"));
        // The next second is unaffected.
        assert!(Segment::create_at(temp_dir.path(), datetime!(2024-01-02 03:04:06 UTC)).await.is_ok());
    }

    #[tokio::test]
    async fn test_append_writes_one_line_per_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut segment = Segment::create(temp_dir.path()).await.unwrap();
        assert!(segment.is_empty());
        segment.append(&record("a.txt")).await.unwrap();
        segment.append(&record("b/c.txt")).await.unwrap();
        assert_eq!(segment.len(), 2);
        let path = temp_dir.path().join(segment.name());
        segment.close().await.unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(contents.ends_with('\n'));
        assert_eq!(lines[0].parse::<FileRecord>().unwrap(), record("a.txt"));
        assert_eq!(lines[1].parse::<FileRecord>().unwrap(), record("b/c.txt"));
    }

    #[tokio::test]
    async fn test_appended_records_are_visible_before_close() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut segment = Segment::create(temp_dir.path()).await.unwrap();
        segment.append(&record("a.txt")).await.unwrap();
        let contents = std::fs::read_to_string(temp_dir.path().join(segment.name())).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
