//! In-memory archive backend for testing.

use crate::ArchiveStore;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A single call to [`MockArchive::upload`] that succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockUpload {
    pub path: PathBuf,
    pub description: String,
    pub archive_id: String,
    /// File contents at the time of upload.
    pub data: Vec<u8>,
}

/// In-memory archive backend for testing.
///
/// Successful uploads are recorded (including the bytes read from disk) and
/// receive sequential archive IDs. Uploads can be scripted to fail by
/// description.
///
/// # Examples
///
/// ```
/// use berg_archive::backend::MockArchive;
///
/// let archive = MockArchive::default().failing_on(["broken.txt"]);
/// assert_eq!(archive.attempts(), 0);
/// ```
pub struct MockArchive {
    name: String,
    failing: HashSet<String>,
    attempts: Mutex<usize>,
    uploads: Mutex<Vec<MockUpload>>,
}

impl MockArchive {
    /// Make every upload with one of these descriptions fail with a
    /// [`Network`](ErrorKind::Network) error.
    pub fn failing_on(mut self, descriptions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.failing.extend(descriptions.into_iter().map(Into::into));
        self
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of upload calls, successful or not.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Successful uploads, in call order.
    pub fn uploads(&self) -> Vec<MockUpload> {
        self.uploads.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for MockArchive {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            failing: HashSet::new(),
            attempts: Mutex::new(0),
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ArchiveStore for MockArchive {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, path: &Path, description: &str) -> Result<String> {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if self.failing.contains(description) {
            exn::bail!(ErrorKind::Network(format!("scripted failure for {description}")));
        }
        let data = tokio::fs::read(path).await.or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
        let mut uploads = self.uploads.lock().unwrap_or_else(PoisonError::into_inner);
        let archive_id = format!("mock-archive-{:04}", uploads.len() + 1);
        uploads.push(MockUpload {
            path: path.to_path_buf(),
            description: description.to_string(),
            archive_id: archive_id.clone(),
            data,
        });
        Ok(archive_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_uploads() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let archive = MockArchive::default();
        let first = archive.upload(&path, "a.txt").await.unwrap();
        let second = archive.upload(&path, "a.txt").await.unwrap();
        assert_ne!(first, second);
        let uploads = archive.uploads();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].description, "a.txt");
        assert_eq!(uploads[0].data, b"hello");
        assert_eq!(uploads[0].archive_id, first);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let archive = MockArchive::default().failing_on(["a.txt"]);
        let err = archive.upload(&path, "a.txt").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert_eq!(archive.attempts(), 1);
        assert!(archive.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = MockArchive::default().with_name("test");
        let err = archive.upload(&temp_dir.path().join("gone.txt"), "gone.txt").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert_eq!(archive.name(), "test");
    }
}
