//! Swatch Runner binary
//!
//! Executes one enrichment pass over the catalog and exits. The run summary is
//! printed to stdout as JSON; logs go to stderr.
//!
//! Exit status is non-zero when the run cannot start (configuration, database)
//! or when the record store becomes unreachable mid-run. Per-record failures
//! are reported in the summary and do not affect the exit status.

use std::sync::Arc;

use anyhow::{Context, Result};
use swatch_runner::config::Config;
use swatch_runner::scheduler::{RunError, shutdown_on_ctrl_c};
use swatch_store::{PgRecordStore, RecordStore, db};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swatch_runner=info,swatch_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Swatch Runner");

    let config = Config::from_env()?;
    config.validate()?;
    info!(
        "Loaded configuration: concurrency={}, extract_workers={}, palette_size={}",
        config.concurrency_limit, config.extract_workers, config.palette_size
    );

    // Keep a few spare connections beyond the task limit for the snapshot read
    let max_connections = u32::try_from(config.concurrency_limit + 2).unwrap_or(u32::MAX);
    let pool = db::create_pool(&config.database_url, max_connections)
        .await
        .context("Failed to connect to database")?;

    info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool.clone()));
    let scheduler = swatch_runner::build_scheduler(&config, store)?;

    let result = scheduler.run_until(shutdown_on_ctrl_c()).await;
    pool.close().await;

    match result {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(RunError::StoreUnreachable {
            consecutive,
            last_error,
            summary,
        }) => {
            error!(
                "Run aborted after {} consecutive store failures: {}",
                consecutive, last_error
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Err(anyhow::anyhow!("Record store unreachable: {}", last_error))
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
