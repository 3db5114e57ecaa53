//! Directory scanning.
//!
//! Walks a backup root and yields every regular file below it as a
//! [`ScannedFile`], skipping the reserved [`RESERVED_DIR`](berg_config::RESERVED_DIR)
//! wherever it appears. Symbolic links and other special files are ignored.

mod stream;

pub use self::stream::scan;
use crate::error::{ErrorKind, Result};
use berg_store::Timestamp;
use std::path::{Component, Path, PathBuf};

/// A regular file found below the backup root.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    /// Path relative to the backup root, `/`-separated. This is the key used
    /// in the metadata store and the description given to the archive.
    pub name: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    pub modified_time: Timestamp,
}

/// Turn a path relative to the backup root into a store name.
///
/// Components are joined with `/` and any backslash is translated to `/` as
/// well, so names are identical no matter which platform produced them.
/// Names that are not UTF-8, or contain characters the segment format cannot
/// hold (tabs and line breaks), are rejected.
pub fn relative_name(relative: &Path) -> Result<String> {
    let unsupported = || exn::Exn::from(ErrorKind::UnsupportedName(relative.to_path_buf()));
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(unsupported)?),
            Component::CurDir => {},
            _ => return Err(unsupported()),
        }
    }
    let name = parts.join("/").replace('\\', "/");
    if name.is_empty() || name.contains(['\t', '\n', '\r']) {
        return Err(unsupported());
    }
    Ok(name)
}
