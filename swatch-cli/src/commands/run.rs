//! Run command handler
//!
//! Runs one enrichment pass against the configured database and reports the
//! outcome. Ctrl-C stops dispatch and waits for in-flight records.

use std::sync::Arc;

use anyhow::Result;
use colored::*;
use swatch_core::RunSummary;
use swatch_runner::config::Config as RunnerConfig;
use swatch_runner::scheduler::{RunError, shutdown_on_ctrl_c};
use swatch_store::RecordStore;

use crate::config::Config;

pub async fn run(config: &Config, concurrency: Option<usize>, json: bool) -> Result<()> {
    let mut runner_config = RunnerConfig::from_env()?;
    runner_config.database_url = config.database_url.clone();
    if let Some(limit) = concurrency {
        runner_config = runner_config.with_concurrency(limit);
    }
    runner_config.validate()?;

    let max_connections = u32::try_from(runner_config.concurrency_limit + 2).unwrap_or(u32::MAX);
    let store = Arc::new(config.connect(max_connections).await?);
    let scheduler = swatch_runner::build_scheduler(
        &runner_config,
        Arc::clone(&store) as Arc<dyn RecordStore>,
    )?;

    if !json {
        println!(
            "{}",
            format!(
                "Running enrichment (concurrency: {}, palette size: {})...",
                runner_config.concurrency_limit, runner_config.palette_size
            )
            .dimmed()
        );
    }

    let result = scheduler.run_until(shutdown_on_ctrl_c()).await;
    store.close().await;

    match result {
        Ok(summary) => report(&summary, json),
        Err(RunError::StoreUnreachable {
            consecutive,
            last_error,
            summary,
        }) => {
            report(&summary, json)?;
            Err(anyhow::anyhow!(
                "Run aborted: record store unreachable after {} consecutive failures ({})",
                consecutive,
                last_error
            ))
        }
        Err(e) => Err(anyhow::Error::from(e).context("Run failed")),
    }
}

fn report(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    let elapsed = summary
        .finished_at
        .signed_duration_since(summary.started_at)
        .num_milliseconds() as f64
        / 1000.0;

    println!();
    println!("{}", "Run Summary:".bold());
    println!("  Run ID:    {}", summary.run_id.to_string().cyan());
    println!("  Duration:  {:.1}s", elapsed);
    println!("  Total:     {}", summary.total);
    println!("  Succeeded: {}", summary.succeeded.to_string().green());
    println!("  Skipped:   {}", summary.skipped.to_string().yellow());
    println!("  Failed:    {}", summary.failed.to_string().red());

    if summary.cancelled {
        println!("  {}", "⚠ Cancelled before all records were dispatched".yellow());
    }

    if !summary.failures.is_empty() {
        println!("\n{}", "Failures:".bold());
        for failure in &summary.failures {
            println!(
                "  {} {} [{}] {}",
                "✗".red(),
                failure.id,
                failure.kind.to_string().red(),
                failure.reason.dimmed()
            );
        }
    }

    Ok(())
}
