use crate::error::{ErrorKind, Result};
use crate::scan::{ScannedFile, relative_name};
use async_stream::stream;
use berg_config::RESERVED_DIR;
use berg_store::Timestamp;
use exn::ResultExt;
use futures::Stream;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry, ReadDir};

enum WalkEntry {
    File(ScannedFile),
    Descend(PathBuf),
    Skip,
}

/// Stream every regular file below `root`.
///
/// The stream is lazy and can only be consumed once. Errors are yielded per
/// entry (an unreadable directory, a file that vanished mid-scan, an
/// unsupported name) and the walk carries on afterwards. Traversal order is
/// unspecified.
pub fn scan(root: &Path) -> impl Stream<Item = Result<ScannedFile>> + '_ {
    let mut stack = vec![root.to_path_buf()];
    stream! {
        'dirs: while let Some(current) = stack.pop() {
            let mut entries = match read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) => { yield Err(e); continue 'dirs; },
            };
            'entries: loop {
                let entry = match entries.next_entry().await.or_raise(|| ErrorKind::ReadDir(current.clone())) {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break 'entries,
                    // Listing can't be resumed reliably after an error; give
                    // up on the rest of this directory.
                    Err(e) => { yield Err(e); break 'entries; },
                };
                match process_entry(root, entry).await {
                    Ok(WalkEntry::File(file)) => yield Ok(file),
                    Ok(WalkEntry::Descend(dir)) => stack.push(dir),
                    Ok(WalkEntry::Skip) => {},
                    Err(e) => yield Err(e),
                }
            }
        }
    }
}

async fn read_dir(path: &Path) -> Result<ReadDir> {
    fs::read_dir(path).await.or_raise(|| ErrorKind::ReadDir(path.to_path_buf()))
}

async fn process_entry(root: &Path, entry: DirEntry) -> Result<WalkEntry> {
    let path = entry.path();
    // Does not follow symlinks.
    let file_type = entry.file_type().await.or_raise(|| ErrorKind::ReadFile(path.clone()))?;
    if file_type.is_dir() {
        if entry.file_name() == RESERVED_DIR {
            tracing::trace!(path = %path.display(), "Skipping reserved directory");
            return Ok(WalkEntry::Skip);
        }
        return Ok(WalkEntry::Descend(path));
    }
    if !file_type.is_file() {
        tracing::debug!(path = %path.display(), "Skipping symlink or special file");
        return Ok(WalkEntry::Skip);
    }
    let metadata = entry.metadata().await.or_raise(|| ErrorKind::ReadFile(path.clone()))?;
    let modified = metadata.modified().or_raise(|| ErrorKind::ReadFile(path.clone()))?;
    let relative = path.strip_prefix(root).or_raise(|| ErrorKind::UnsupportedName(path.clone()))?;
    Ok(WalkEntry::File(ScannedFile {
        name: relative_name(relative)?,
        modified_time: Timestamp::from(modified),
        path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::collections::BTreeMap;

    async fn collect(root: &Path) -> BTreeMap<String, ScannedFile> {
        scan(root).map(|file| file.unwrap()).map(|file| (file.name.clone(), file)).collect().await
    }

    fn write(root: &Path, name: &str, contents: &str) {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_empty_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(collect(temp_dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_finds_nested_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "a.txt", "a");
        write(temp_dir.path(), "docs/b.txt", "b");
        write(temp_dir.path(), "docs/2024/c.txt", "c");
        std::fs::create_dir(temp_dir.path().join("empty")).unwrap();

        let files = collect(temp_dir.path()).await;
        let names: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(names, ["a.txt", "docs/2024/c.txt", "docs/b.txt"]);
        assert_eq!(files["docs/b.txt"].path, temp_dir.path().join("docs/b.txt"));
    }

    #[tokio::test]
    async fn test_skips_reserved_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "a.txt", "a");
        write(temp_dir.path(), ".berg/config", "vault = v");
        write(temp_dir.path(), ".berg/20240101_000000.00.db", "");
        write(temp_dir.path(), "nested/.berg/config", "vault = other");
        // Only directories are reserved; a file with the same name is content.
        write(temp_dir.path(), "other/.berg", "not a directory");

        let files = collect(temp_dir.path()).await;
        let names: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(names, ["a.txt", "other/.berg"]);
    }

    #[tokio::test]
    async fn test_modified_time() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "a.txt", "a");
        let mtime = std::time::UNIX_EPOCH + std::time::Duration::from_millis(1_700_000_000_250);
        std::fs::File::options()
            .write(true)
            .open(temp_dir.path().join("a.txt"))
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let files = collect(temp_dir.path()).await;
        assert!(files["a.txt"].modified_time.is_close_to(Timestamp::from_secs(1_700_000_000.25)));
    }

    #[tokio::test]
    async fn test_modified_time_beyond_calendar_range() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "future.txt", "a");
        let mtime = std::time::UNIX_EPOCH + std::time::Duration::from_secs(300_000_000_000);
        let file = std::fs::File::options().write(true).open(temp_dir.path().join("future.txt")).unwrap();
        if file.set_modified(mtime).is_err() {
            // Not every filesystem accepts timestamps this far out.
            return;
        }
        drop(file);
        // Some filesystems clamp instead of refusing; either way the scan
        // must report the file rather than fail.
        let files = collect(temp_dir.path()).await;
        let stored = files["future.txt"].modified_time.as_secs();
        assert!(stored.is_finite());
        assert!(stored > Timestamp::now().as_secs());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_skips_symlinks() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "a.txt", "a");
        std::os::unix::fs::symlink(temp_dir.path().join("a.txt"), temp_dir.path().join("link.txt")).unwrap();
        let files = collect(temp_dir.path()).await;
        assert_eq!(files.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unsupported_name_does_not_stop_scan() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "good.txt", "a");
        write(temp_dir.path(), "bad\tname.txt", "b");
        let results: Vec<_> = scan(temp_dir.path()).collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let err = results.into_iter().find_map(|r| r.err()).unwrap();
        assert!(matches!(&*err, ErrorKind::UnsupportedName(_)));
    }
}
