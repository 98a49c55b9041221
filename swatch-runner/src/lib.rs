//! Swatch Runner
//!
//! The image-enrichment pipeline: for every catalog record, fetch the record's
//! image, extract its dominant colors, encode them as hex strings and persist
//! them back onto the record.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Fetcher: HTTP retrieval of image bytes with probe, size limit and timeout
//! - Palette: Decoding and dominant color extraction
//! - Task: The per-record fetch -> extract -> encode -> persist sequence
//! - Scheduler: Snapshot fan-out under a concurrency cap and run summary

pub mod config;
pub mod context;
pub mod fetcher;
pub mod outcome;
pub mod palette;
pub mod scheduler;
pub mod task;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use swatch_store::RecordStore;

use crate::config::Config;
use crate::context::EnrichmentContext;
use crate::fetcher::HttpImageFetcher;
use crate::palette::MedianCutExtractor;
use crate::scheduler::{PipelineScheduler, SchedulerSettings};

/// Wires the production fetcher and extractor around a record store
pub fn build_scheduler(config: &Config, store: Arc<dyn RecordStore>) -> Result<PipelineScheduler> {
    let fetcher =
        HttpImageFetcher::from_config(config).context("Failed to build HTTP image fetcher")?;
    let extractor = MedianCutExtractor::new(config.palette_size, config.sample_quality);

    let context = EnrichmentContext::new(
        store,
        Arc::new(fetcher),
        Arc::new(extractor),
        config.extract_workers,
        config.persist_timeout,
    );

    Ok(PipelineScheduler::new(
        Arc::new(context),
        SchedulerSettings::from(config),
    ))
}
