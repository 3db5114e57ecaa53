//! Configuration loading and validation.
//!
//! Two files are consulted for every backup root:
//!
//! - `<root>/.berg/config`: settings for this directory,
//! - `~/.berg`: user-wide defaults (typically the credentials).
//!
//! Both are read into a [`ConfigSource`] (every field optional, no
//! validation) and [`Config::merge`] combines them: directory values win over
//! user values, defaults are applied, and the required properties are
//! checked. Validation happens before anything touches the backup root or
//! the network.

pub mod error;
mod provider;

pub use crate::provider::KeyValueFile;
use crate::error::{ErrorKind, Result};
use figment::Figment;
use serde::Deserialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Name of the directory (inside each backup root) holding the directory
/// config and the metadata store. Never backed up itself.
pub const RESERVED_DIR: &str = ".berg";
/// Name of the directory config file inside [`RESERVED_DIR`].
pub const DIR_CONFIG_FILE: &str = "config";
/// Name of the user-wide config file inside the home directory.
pub const USER_CONFIG_FILE: &str = ".berg";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SEGMENT_SIZE: NonZeroUsize = NonZeroUsize::new(20).unwrap();

/// Raw, unvalidated values from a single configuration file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigSource {
    pub vault: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub proxy: Option<String>,
    pub proxy_port: Option<String>,
    pub region: Option<String>,
    pub dbfile_size: Option<String>,
}

impl ConfigSource {
    /// Read a `key = value` file. A missing file is an empty source.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Figment::from(KeyValueFile::file(path))
            .extract()
            .map_err(|e| exn::Exn::from(ErrorKind::InvalidFile(path.to_path_buf(), e.to_string())))
    }
}

/// Access key pair for the archive service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// HTTP proxy used to reach the archive service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub host: String,
    pub port: Option<u16>,
}

impl Proxy {
    /// The proxy as a URI. A bare host is taken to be a plain HTTP proxy.
    pub fn uri(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let scheme = if host.contains("://") { "" } else { "http://" };
        match self.port {
            Some(port) => format!("{scheme}{host}:{port}"),
            None => format!("{scheme}{host}"),
        }
    }
}

/// Validated configuration for backing up one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Vault receiving the uploads for this directory.
    pub vault: String,
    pub credentials: Credentials,
    pub proxy: Option<Proxy>,
    pub region: String,
    /// Maximum number of upload records per segment.
    pub segment_size: NonZeroUsize,
}

impl Config {
    /// Resolve the configuration for the backup root `root`, using the
    /// user-wide config from the current user's home directory.
    pub fn for_directory(root: impl AsRef<Path>) -> Result<Self> {
        let dir_config = root.as_ref().join(RESERVED_DIR).join(DIR_CONFIG_FILE);
        let user_config = user_config_path();
        if user_config.is_none() {
            tracing::warn!("Unable to locate home directory; ignoring user-wide config");
        }
        Self::load(&dir_config, user_config.as_deref())
    }

    /// Read both files and [`merge`](Self::merge) them.
    pub fn load(dir_config: &Path, user_config: Option<&Path>) -> Result<Self> {
        let user = match user_config {
            Some(path) => ConfigSource::from_file(path)?,
            None => ConfigSource::default(),
        };
        let dir = ConfigSource::from_file(dir_config)?;
        let config = Self::merge(dir, user)?;
        tracing::debug!(?config, "Combined configuration");
        Ok(config)
    }

    /// Overlay the directory source onto the user source and validate.
    ///
    /// `vault` is only ever taken from the directory source, so a user-wide
    /// default can never send two directories into the same vault by
    /// accident.
    pub fn merge(dir: ConfigSource, user: ConfigSource) -> Result<Self> {
        let ConfigSource {
            vault,
            aws_access_key_id,
            aws_secret_access_key,
            proxy,
            proxy_port,
            region,
            dbfile_size,
        } = dir;
        let vault = vault.ok_or_else(|| exn::Exn::from(ErrorKind::MissingVault))?;
        let access_key_id = aws_access_key_id
            .or(user.aws_access_key_id)
            .ok_or_else(|| exn::Exn::from(ErrorKind::MissingCredential("aws_access_key_id")))?;
        let secret_access_key = aws_secret_access_key
            .or(user.aws_secret_access_key)
            .ok_or_else(|| exn::Exn::from(ErrorKind::MissingCredential("aws_secret_access_key")))?;
        let port = proxy_port
            .or(user.proxy_port)
            .map(|port| port.parse::<u16>().map_err(|_| ErrorKind::InvalidValue("proxy_port", port)))
            .transpose()?;
        let proxy = match (proxy.or(user.proxy), port) {
            (Some(host), port) => Some(Proxy { host, port }),
            (None, None) => None,
            (None, Some(port)) => exn::bail!(ErrorKind::InvalidValue("proxy_port", format!("{port} (no proxy set)"))),
        };
        let region = region.or(user.region).unwrap_or_else(|| DEFAULT_REGION.to_string());
        let segment_size = match dbfile_size.or(user.dbfile_size) {
            Some(size) => size.parse::<NonZeroUsize>().map_err(|_| ErrorKind::InvalidValue("dbfile_size", size))?,
            None => DEFAULT_SEGMENT_SIZE,
        };
        Ok(Self {
            vault,
            credentials: Credentials { access_key_id, secret_access_key },
            proxy,
            region,
            segment_size,
        })
    }
}

/// Location of the user-wide config file, if a home directory can be found.
pub fn user_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(USER_CONFIG_FILE))
}
