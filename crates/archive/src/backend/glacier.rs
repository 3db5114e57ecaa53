//! Amazon S3 Glacier vault backend.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration files (an access
//! key pair), never from the environment or `~/.aws`.
//!
//! # Proxies
//!
//! When a proxy is configured, every request (HTTP and HTTPS) is sent through
//! it. Without one, the SDK's default client is used unchanged.

use crate::{
    ArchiveStore,
    error::{ErrorKind, Result},
};
use async_trait::async_trait;
use aws_sdk_glacier::{
    Client,
    config::{BehaviorVersion, Credentials, Region, SharedHttpClient, retry::RetryConfig},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
};
use aws_smithy_http_client::{
    proxy::ProxyConfig,
    tls::{self, rustls_provider::CryptoMode},
};
use exn::{OptionExt, ResultExt};
use std::path::Path;
use tracing::instrument;

/// Glacier uses `-` to mean "the account owning the credentials".
const ACCOUNT_ID: &str = "-";

/// Archive backend uploading each file as one archive into a Glacier vault.
///
/// # Examples
///
/// ```no_run
/// use berg_archive::backend::GlacierArchive;
///
/// let archive = GlacierArchive::new(
///     "my-vault",
///     "us-east-1",
///     "access_key_id",
///     "secret_access_key",
///     Some("http://proxy.internal:3128"),
/// )?;
/// # Ok::<(), berg_archive::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct GlacierArchive {
    client: Client,
    vault: String,
    proxy: Option<String>,
}

impl GlacierArchive {
    /// Create a new Glacier backend.
    ///
    /// No network traffic happens until the first upload.
    ///
    /// # Arguments
    /// * `vault` - Name of an existing vault
    /// * `region` - AWS region the vault lives in
    /// * `key_id` - AWS access key ID
    /// * `key_secret` - AWS secret access key
    /// * `proxy` - Proxy URI (for example `http://proxy:3128`) to send all
    ///   requests through
    ///
    /// Fails with [`InvalidProxy`](ErrorKind::InvalidProxy) if `proxy` cannot
    /// be parsed.
    pub fn new(
        vault: impl Into<String>,
        region: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        proxy: Option<&str>,
    ) -> Result<Self> {
        let credentials = Credentials::new(key_id, key_secret, None, None, "berg-config");
        let mut config = aws_sdk_glacier::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // A failed upload is retried by the next backup run instead.
            .retry_config(RetryConfig::disabled());
        if let Some(http_client) = proxied_http_client(proxy)? {
            config = config.http_client(http_client);
        }
        Ok(Self {
            client: Client::from_conf(config.build()),
            vault: vault.into(),
            proxy: proxy.map(str::to_string),
        })
    }

    /// The proxy requests are sent through, if any.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }
}

/// An HTTPS client routing everything through `proxy`, or `None` to keep the
/// SDK default.
fn proxied_http_client(proxy: Option<&str>) -> Result<Option<SharedHttpClient>> {
    let Some(proxy) = proxy else {
        return Ok(None);
    };
    let proxy_config = ProxyConfig::all(proxy).or_raise(|| ErrorKind::InvalidProxy(proxy.to_string()))?;
    tracing::debug!(%proxy, "Routing archive requests through proxy");
    let client = aws_smithy_http_client::Builder::new()
        .proxy_config(proxy_config)
        .tls_provider(tls::Provider::Rustls(CryptoMode::AwsLc))
        .build_https();
    Ok(Some(client))
}

#[async_trait]
impl ArchiveStore for GlacierArchive {
    fn name(&self) -> &str {
        &self.vault
    }

    #[instrument(skip(self), fields(vault = %self.vault))]
    async fn upload(&self, path: &Path, description: &str) -> Result<String> {
        let body = ByteStream::from_path(path).await.or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
        let output = self
            .client
            .upload_archive()
            .account_id(ACCOUNT_ID)
            .vault_name(&self.vault)
            .archive_description(description)
            .body(body)
            .send()
            .await
            .map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                match err {
                    SdkError::ServiceError(_) => ErrorKind::Rejected(message),
                    _ => ErrorKind::Network(message),
                }
            })?;
        output.archive_id().map(str::to_string).ok_or_raise(|| ErrorKind::MissingArchiveId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_without_proxy_keeps_default_client() {
        assert!(proxied_http_client(None).unwrap().is_none());
        let archive = GlacierArchive::new("vault", "us-east-1", "id", "secret", None).unwrap();
        assert_eq!(archive.proxy(), None);
        assert_eq!(archive.name(), "vault");
    }

    #[tokio::test]
    async fn test_proxy_installs_client() {
        assert!(proxied_http_client(Some("http://proxy.internal:3128")).unwrap().is_some());
        let archive = GlacierArchive::new("vault", "eu-west-1", "id", "secret", Some("http://proxy.internal:3128")).unwrap();
        assert_eq!(archive.proxy(), Some("http://proxy.internal:3128"));
    }

    #[tokio::test]
    async fn test_invalid_proxy() {
        let err = GlacierArchive::new("vault", "us-east-1", "id", "secret", Some("not a uri")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidProxy(_)));
    }
}
