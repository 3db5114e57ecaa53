use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "berg", version, about = "Incremental backups of local directories into cold-archive vaults")]
pub struct Args {
    /// Directories to back up, in order. Each needs a `.berg/config` naming
    /// its vault.
    #[arg(required = true, value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// Log debug output (overridden by `RUST_LOG`)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "berg=debug,berg_backup=debug,berg_store=debug,berg_config=debug,berg_archive=debug"
        } else {
            "berg=info,berg_backup=info,berg_store=info,berg_config=info,berg_archive=info"
        }
    }
}
