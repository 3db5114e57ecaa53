use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::instrument;

/// Files are hashed in chunks of this size, never loaded whole.
const CHUNK_SIZE: usize = 64 * 1024;

/// BLAKE3 hash of a file's contents, as lowercase hex.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub(crate) async fn digest_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).await.or_raise(|| ErrorKind::ReadFile(path.to_path_buf()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await.or_raise(|| ErrorKind::ReadFile(path.to_path_buf()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_string())
}
