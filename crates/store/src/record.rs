use crate::Timestamp;
use crate::error::{Error, ErrorKind, Result};
use std::fmt;
use std::str::FromStr;

/// Number of hex characters in a content digest (256-bit hash).
pub const DIGEST_HEX_LEN: usize = 64;
const FIELD_SEPARATOR: char = '\t';
const FIELD_COUNT: usize = 5;

/// The last known backup state of a single file.
///
/// Only ever constructed for files that have been uploaded at least once, so
/// every record has an `archive_id`. Serialized as a single tab-separated line
/// (see the [`Display`](fmt::Display) and [`FromStr`] implementations).
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Path relative to the backup root, using `/` separators.
    pub name: String,
    /// Handle returned by the archive when the file was uploaded.
    pub archive_id: String,
    /// Modification time of the file as last observed.
    pub modified_time: Timestamp,
    /// When the upload that produced `archive_id` finished.
    pub backup_time: Timestamp,
    /// Hex-encoded content hash at the time of upload.
    pub digest: String,
}

impl FileRecord {
    /// Copy of this record with only the modification time updated.
    ///
    /// Used when a file's timestamp changed but its content did not: the
    /// archive still holds identical bytes, so everything upload-related is
    /// carried forward.
    pub fn touched(&self, modified_time: Timestamp) -> Self {
        Self {
            modified_time,
            ..self.clone()
        }
    }

    fn field<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str> {
        match value {
            Some(value) if !value.is_empty() => Ok(value),
            _ => exn::bail!(ErrorKind::InvalidRecord(format!("missing {name}"))),
        }
    }

    fn is_valid_digest(digest: &str) -> bool {
        digest.len() == DIGEST_HEX_LEN && digest.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.name,
            self.archive_id,
            self.modified_time,
            self.backup_time,
            self.digest,
            sep = FIELD_SEPARATOR,
        )
    }
}

impl FromStr for FileRecord {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let count = line.split(FIELD_SEPARATOR).count();
        if count != FIELD_COUNT {
            exn::bail!(ErrorKind::InvalidRecord(format!("expected {FIELD_COUNT} fields, found {count}")));
        }
        let mut fields = line.split(FIELD_SEPARATOR);
        let name = Self::field("name", fields.next())?;
        let archive_id = Self::field("archive id", fields.next())?;
        let modified_time = Self::field("modified time", fields.next())?.parse()?;
        let backup_time = Self::field("backup time", fields.next())?.parse()?;
        let digest = Self::field("digest", fields.next())?;
        // A torn write at the end of a segment usually cuts the digest short.
        if !Self::is_valid_digest(digest) {
            exn::bail!(ErrorKind::InvalidRecord(format!("malformed digest `{digest}`")));
        }
        Ok(Self {
            name: name.to_string(),
            archive_id: archive_id.to_string(),
            modified_time,
            backup_time,
            digest: digest.to_ascii_lowercase(),
        })
    }
}
