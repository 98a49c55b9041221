//! Catalog command handlers
//!
//! Seeding, clearing and listing the product records the pipeline enriches.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::*;
use swatch_core::{HexColor, Record};
use swatch_store::{RecordStore, seed};

use crate::config::Config;

/// Upsert the sample catalog or the records in `file`
pub async fn seed(config: &Config, file: Option<PathBuf>) -> Result<()> {
    let records = match &file {
        Some(path) => seed::load_records(path)
            .with_context(|| format!("Failed to load records from {}", path.display()))?,
        None => seed::sample_records(),
    };

    let store = config.connect(2).await?;
    let written = store.upsert_records(&records).await;
    store.close().await;
    let written = written.context("Failed to seed records")?;

    let source = file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "sample catalog".to_string());

    println!(
        "{}",
        format!("✓ Seeded {} record(s) from {}", written, source)
            .green()
            .bold()
    );

    Ok(())
}

/// Delete every record
pub async fn clear(config: &Config) -> Result<()> {
    let store = config.connect(2).await?;
    let removed = store.clear().await;
    store.close().await;
    let removed = removed.context("Failed to clear records")?;

    if removed == 0 {
        println!("{}", "Catalog was already empty.".yellow());
    } else {
        println!(
            "{}",
            format!("✓ Removed {} record(s)", removed).green().bold()
        );
    }

    Ok(())
}

/// List all records
pub async fn list(config: &Config) -> Result<()> {
    let store = config.connect(2).await?;
    let records = store.fetch_all().await;
    store.close().await;
    let records = records.context("Failed to list records")?;

    if records.is_empty() {
        println!("{}", "No records found.".yellow());
        return Ok(());
    }

    let enriched = records
        .iter()
        .filter(|r| r.calculated_colors.is_some())
        .count();

    println!(
        "{}",
        format!(
            "Found {} record(s), {} with a palette:",
            records.len(),
            enriched
        )
        .bold()
    );
    println!();
    for record in &records {
        print_record(record);
    }

    Ok(())
}

fn print_record(record: &Record) {
    println!("  {} {}", "▸".cyan(), record.id.bold());

    if let Some(title) = record.attributes.get("title").and_then(|v| v.as_str()) {
        println!("    Title:   {}", title);
    }

    match &record.image_url {
        Some(url) => println!("    Image:   {}", url.dimmed()),
        None => println!("    Image:   {}", "none".yellow()),
    }

    match &record.calculated_colors {
        Some(colors) if !colors.is_empty() => {
            println!("    Palette: {}", swatches(colors));
            println!(
                "             {}",
                colors
                    .iter()
                    .map(HexColor::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
                    .dimmed()
            );
        }
        Some(_) => println!("    Palette: {}", "empty".yellow()),
        None => println!("    Palette: {}", "not calculated".dimmed()),
    }

    println!();
}

/// Renders each color as a block on a truecolor terminal
fn swatches(colors: &[HexColor]) -> String {
    colors
        .iter()
        .map(|color| {
            let rgb = color.to_rgb();
            "  ".on_truecolor(rgb.r, rgb.g, rgb.b).to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
