//! Figment provider for `key = value` configuration files.
//!
//! The format is deliberately tiny:
//!
//! ```text
//! # comments start with a hash
//! vault = photos
//! aws_access_key_id = AKIA...
//! ```
//!
//! Blank lines and comments are ignored. Every other line must contain an
//! `=` with a non-empty key and a non-empty value (both trimmed). Later lines
//! override earlier ones with the same key.

use figment::value::{Dict, Map, Value};
use figment::{Error as FigmentError, Metadata, Profile, Provider, Source};
use std::collections::BTreeMap;
use std::path::PathBuf;

enum Input {
    File(PathBuf),
    String(String),
}

/// A [`Provider`] reading the `key = value` format.
///
/// A file that does not exist provides no values rather than failing, so a
/// missing user-wide config is not an error.
pub struct KeyValueFile {
    input: Input,
}

impl KeyValueFile {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { input: Input::File(path.into()) }
    }

    pub fn string(contents: impl Into<String>) -> Self {
        Self { input: Input::String(contents.into()) }
    }
}

impl Provider for KeyValueFile {
    fn metadata(&self) -> Metadata {
        match &self.input {
            Input::File(path) => Metadata::from("key/value file", Source::File(path.clone())),
            Input::String(_) => Metadata::named("key/value string"),
        }
    }

    fn data(&self) -> Result<Map<Profile, Dict>, FigmentError> {
        let contents = match &self.input {
            Input::String(contents) => contents.clone(),
            Input::File(path) => match std::fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(err) => return Err(format!("unable to read {}: {err}", path.display()).into()),
            },
        };
        let dict: Dict = parse(&contents)?.into_iter().map(|(key, value)| (key, Value::from(value))).collect();
        Ok(Map::from([(Profile::Default, dict)]))
    }
}

/// Parse `key = value` lines into a map.
fn parse(contents: &str) -> Result<BTreeMap<String, String>, String> {
    let mut values = BTreeMap::new();
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(format!("invalid line '{line}'"));
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(format!("empty key in line '{line}'"));
        }
        if value.is_empty() {
            return Err(format!("empty value in line '{line}'"));
        }
        values.insert(key.to_string(), value.to_string());
    }
    Ok(values)
}
