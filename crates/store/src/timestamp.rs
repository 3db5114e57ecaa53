use crate::error::{ErrorKind, Result};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;

/// Seconds since the Unix epoch, with sub-second precision.
///
/// Serialized with exactly six decimal places, so anything closer together
/// than [`Timestamp::TOLERANCE`] is considered the same instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Largest difference (in seconds) still treated as "no change".
    pub const TOLERANCE: f64 = 1e-6;

    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }

    pub fn now() -> Self {
        OffsetDateTime::now_utc().into()
    }

    /// Whether two timestamps fall within the tolerance window of each other.
    pub fn is_close_to(self, other: Timestamp) -> bool {
        (self.0 - other.0).abs() <= Self::TOLERANCE
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self(value.unix_timestamp_nanos() as f64 / 1_000_000_000.0)
    }
}

/// Never fails: any file modification time the OS can report is
/// representable, including ones before the epoch or far past the year 9999.
impl From<SystemTime> for Timestamp {
    fn from(value: SystemTime) -> Self {
        match value.duration_since(UNIX_EPOCH) {
            Ok(since) => Self(since.as_secs_f64()),
            Err(err) => Self(-err.duration().as_secs_f64()),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

impl FromStr for Timestamp {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<f64>() {
            Ok(secs) if secs.is_finite() => Ok(Self(secs)),
            _ => exn::bail!(ErrorKind::InvalidRecord(format!("invalid timestamp `{s}`"))),
        }
    }
}
