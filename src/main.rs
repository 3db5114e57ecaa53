//! berg: incremental backups of local directories into cold-archive vaults.
//!
//! Usage:
//!     berg [-v] <DIR>...

mod cli;

use berg_archive::backend::GlacierArchive;
use berg_archive::{ArchiveHandle, ArchiveStore};
use berg_config::{Config, Proxy};
use clap::Parser;
use cli::Args;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.default_log_filter())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut failed = 0usize;
    for dir in &args.dirs {
        if !backup_directory(dir).await {
            failed += 1;
        }
    }
    if failed > 0 {
        tracing::error!(failed, total = args.dirs.len(), "Some directories were not backed up");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Back up a single root, logging any fatal error. Returns `false` on failure.
async fn backup_directory(dir: &Path) -> bool {
    tracing::info!(dir = %dir.display(), "Backing up directory");
    let config = match Config::for_directory(dir) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(dir = %dir.display(), "Invalid configuration: {err:?}");
            return false;
        },
    };
    let segment_size = config.segment_size;
    let connect = move || async move {
        let proxy = config.proxy.as_ref().map(Proxy::uri);
        let archive = GlacierArchive::new(
            config.vault,
            config.region,
            config.credentials.access_key_id,
            config.credentials.secret_access_key,
            proxy.as_deref(),
        )?;
        tracing::info!(vault = archive.name(), proxy = ?archive.proxy(), "Connecting to archive");
        Ok::<ArchiveHandle, berg_archive::error::Error>(Arc::new(archive))
    };
    match berg_backup::backup(dir, segment_size, connect).await {
        Ok(report) => {
            if report.failed > 0 {
                tracing::warn!(dir = %dir.display(), failed = report.failed, "Some uploads failed and will be retried on the next run");
            }
            true
        },
        Err(err) => {
            tracing::error!(dir = %dir.display(), "Backup failed: {err:?}");
            false
        },
    }
}
