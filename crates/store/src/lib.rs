//! Append-only metadata store for backed-up files.
//!
//! This crate records which files have been uploaded to the archive, and
//! what they looked like at the time. It is the source of truth for deciding
//! whether a file needs uploading again.
//!
//! # Architecture
//! The store is a directory of immutable **segments**. Each segment is a text
//! file holding one [`FileRecord`] per line, and segment names sort in
//! creation order. Nothing is ever rewritten: loading replays every segment in
//! order and the last record seen for a name wins. Updating a file's state
//! means appending a new record to a new segment.
//!
//! A damaged line (for example one torn by a crash mid-write) only loses that
//! line; everything else still loads.

pub mod error;
mod record;
mod segment;
mod timestamp;

pub use crate::record::{DIGEST_HEX_LEN, FileRecord};
pub use crate::segment::{SEGMENT_EXTENSION, Segment};
pub use crate::timestamp::Timestamp;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// Latest record for every known file, keyed by [`FileRecord::name`].
pub type View = HashMap<String, FileRecord>;

/// Handle to a store directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    /// Use `dir` as the store directory. Nothing is touched on disk until a
    /// segment is created.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replay every segment in name order and return the latest record per
    /// file.
    ///
    /// Lines that fail to parse are logged and skipped. A store directory
    /// that does not exist yet is simply empty.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn load(&self) -> Result<View> {
        let mut view = View::new();
        for name in self.segment_names().await? {
            let path = self.dir.join(&name);
            let contents = fs::read(&path).await.or_raise(|| ErrorKind::Io(path.clone()))?;
            let mut loaded = 0usize;
            for (index, line) in contents.split(|b| *b == b'\n').enumerate() {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let parsed = std::str::from_utf8(line)
                    .or_raise(|| ErrorKind::InvalidRecord("not valid UTF-8".to_string()))
                    .and_then(str::parse::<FileRecord>);
                match parsed {
                    Ok(record) => {
                        loaded += 1;
                        view.insert(record.name.clone(), record);
                    },
                    Err(err) => {
                        tracing::warn!(segment = %name, line = index + 1, reason = %*err, "Skipping unreadable record");
                    },
                }
            }
            tracing::trace!(segment = %name, records = loaded, "Replayed segment");
        }
        tracing::debug!(files = view.len(), "Loaded metadata store");
        Ok(view)
    }

    /// Create a new, empty segment to append records to.
    ///
    /// Fails with [`SegmentNamesExhausted`](ErrorKind::SegmentNamesExhausted)
    /// if a hundred segments were already created within the current second.
    pub async fn new_segment(&self) -> Result<Segment> {
        fs::create_dir_all(&self.dir).await.or_raise(|| ErrorKind::Io(self.dir.clone()))?;
        Segment::create(&self.dir).await
    }

    /// Segment file names, sorted into replay order.
    async fn segment_names(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err).or_raise(|| ErrorKind::Io(self.dir.clone())),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Io(self.dir.clone()))? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(SEGMENT_EXTENSION) {
                continue;
            }
            let file_type = entry.file_type().await.or_raise(|| ErrorKind::Io(entry.path()))?;
            if file_type.is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, archive_id: &str, modified: f64) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            archive_id: archive_id.to_string(),
            modified_time: Timestamp::from_secs(modified),
            backup_time: Timestamp::from_secs(modified + 60.0),
            digest: "ab".repeat(DIGEST_HEX_LEN / 2),
        }
    }

    fn write_segment(dir: &Path, name: &str, records: &[FileRecord]) {
        let contents: String = records.iter().map(|r| format!("{r}\n")).collect();
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(temp_dir.path().join("does-not-exist"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_later_segment_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        // Written out of order on purpose: replay order comes from the names.
        write_segment(temp_dir.path(), "20240102_000000.00.db", &[record("x.txt", "later", 2.0)]);
        write_segment(temp_dir.path(), "20240101_000000.00.db", &[
            record("x.txt", "earlier", 1.0),
            record("y.txt", "only", 1.0),
        ]);
        let view = MetadataStore::new(temp_dir.path()).load().await.unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view["x.txt"], record("x.txt", "later", 2.0));
        assert_eq!(view["y.txt"].archive_id, "only");
    }

    #[tokio::test]
    async fn test_disambiguator_orders_segments_within_a_second() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_segment(temp_dir.path(), "20240101_000000.01.db", &[record("x.txt", "second", 2.0)]);
        write_segment(temp_dir.path(), "20240101_000000.00.db", &[record("x.txt", "first", 1.0)]);
        let view = MetadataStore::new(temp_dir.path()).load().await.unwrap();
        assert_eq!(view["x.txt"].archive_id, "second");
    }

    #[tokio::test]
    async fn test_malformed_line_is_isolated() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut contents = String::new();
        for n in 0..9 {
            contents.push_str(&format!("{}\n", record(&format!("file-{n}.txt"), "id", n as f64)));
            if n == 4 {
                contents.push_str("this line is not a record\n");
            }
        }
        std::fs::write(temp_dir.path().join("20240101_000000.00.db"), contents).unwrap();
        let view = MetadataStore::new(temp_dir.path()).load().await.unwrap();
        assert_eq!(view.len(), 9);
    }

    #[tokio::test]
    async fn test_torn_last_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let good = record("good.txt", "id", 1.0).to_string();
        let torn = record("torn.txt", "id", 1.0).to_string();
        let torn = &torn[..torn.len() - 10];
        std::fs::write(temp_dir.path().join("20240101_000000.00.db"), format!("{good}\n{torn}")).unwrap();
        let view = MetadataStore::new(temp_dir.path()).load().await.unwrap();
        assert_eq!(view.len(), 1);
        assert!(view.contains_key("good.txt"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_isolated() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut contents = format!("{}\n", record("good.txt", "id", 1.0)).into_bytes();
        contents.extend_from_slice(b"\xff\xfe\tid\t1.0\t2.0\tbad\n\n");
        std::fs::write(temp_dir.path().join("20240101_000000.00.db"), contents).unwrap();
        let view = MetadataStore::new(temp_dir.path()).load().await.unwrap();
        assert_eq!(view.len(), 1);
    }

    #[tokio::test]
    async fn test_ignores_other_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("config"), "vault = test\n").unwrap();
        std::fs::create_dir(temp_dir.path().join("nested.db")).unwrap();
        write_segment(temp_dir.path(), "20240101_000000.00.db", &[record("a.txt", "id", 1.0)]);
        let view = MetadataStore::new(temp_dir.path()).load().await.unwrap();
        assert_eq!(view.len(), 1);
    }

    #[tokio::test]
    async fn test_appended_segments_are_replayed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(temp_dir.path().join(".berg"));
        let mut segment = store.new_segment().await.unwrap();
        segment.append(&record("a.txt", "first", 1.0)).await.unwrap();
        segment.close().await.unwrap();
        let mut segment = store.new_segment().await.unwrap();
        segment.append(&record("a.txt", "second", 2.0)).await.unwrap();
        segment.close().await.unwrap();

        let view = store.load().await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view["a.txt"].archive_id, "second");
        assert!(view["a.txt"].modified_time.is_close_to(Timestamp::from_secs(2.0)));
    }
}
