//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod catalog;
mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Insert or update catalog records
    Seed {
        /// JSON file holding an array of records (defaults to the bundled sample catalog)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Delete every catalog record
    Clear,
    /// List catalog records with their palettes
    List,
    /// Run one enrichment pass over the catalog
    Run {
        /// Maximum number of records processed at once
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Seed { file } => catalog::seed(config, file).await,
        Commands::Clear => catalog::clear(config).await,
        Commands::List => catalog::list(config).await,
        Commands::Run { concurrency, json } => run::run(config, concurrency, json).await,
    }
}
