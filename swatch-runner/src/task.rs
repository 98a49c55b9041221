//! Enrichment task
//!
//! Processes one record through `fetch -> extract -> encode -> persist`.
//! Stages run strictly in that order and the first failure ends the task.
//! A task never returns an error: every path ends in an [`EnrichmentOutcome`].

use std::sync::Arc;

use swatch_core::{HexColor, Record, to_hex};
use tracing::{debug, warn};
use url::Url;

use crate::context::EnrichmentContext;
use crate::outcome::{EnrichmentOutcome, SkipReason, TaskError, TaskStage};

pub struct EnrichmentTask {
    record: Record,
    context: Arc<EnrichmentContext>,
}

impl EnrichmentTask {
    pub fn new(record: Record, context: Arc<EnrichmentContext>) -> Self {
        Self { record, context }
    }

    /// Runs the task to a terminal outcome
    pub async fn run(self) -> EnrichmentOutcome {
        let id = self.record.id.clone();

        let url = match validate_image_url(self.record.image_url.as_deref()) {
            Ok(url) => url,
            Err(reason) => {
                debug!("Record {} skipped while {}: {}", id, TaskStage::Pending, reason);
                return EnrichmentOutcome::Skipped { id, reason };
            }
        };

        match self.enrich(&url).await {
            Ok(colors) => {
                debug!("Record {} enriched with {} color(s)", id, colors.len());
                EnrichmentOutcome::Success { id, colors }
            }
            Err(error) => {
                let stage = error.stage().map(|s| s.to_string());
                warn!(
                    "Record {} failed while {}: {}",
                    id,
                    stage.as_deref().unwrap_or("running"),
                    error
                );
                EnrichmentOutcome::Failed { id, error }
            }
        }
    }

    async fn enrich(&self, url: &Url) -> Result<Vec<HexColor>, TaskError> {
        let id = &self.record.id;

        debug!("Record {} {}: {}", id, TaskStage::Fetching, url);
        let bytes = self.context.fetcher.fetch(url).await?;

        debug!("Record {} {}: {} bytes", id, TaskStage::Extracting, bytes.len());
        let palette = self.context.extract(bytes).await?;

        debug!("Record {} {}: {} color(s)", id, TaskStage::Encoding, palette.len());
        let colors: Vec<HexColor> = palette.into_iter().map(to_hex).collect();

        debug!("Record {} {}", id, TaskStage::Persisting);
        self.context.persist(id, colors.clone()).await?;

        Ok(colors)
    }
}

/// Checks that a record carries a usable absolute http(s) image URL
pub fn validate_image_url(raw: Option<&str>) -> Result<Url, SkipReason> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SkipReason::MissingImageUrl)?;

    let url = Url::parse(raw).map_err(|e| SkipReason::InvalidImageUrl(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SkipReason::InvalidImageUrl(format!(
            "{}: unsupported scheme {}",
            raw,
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(SkipReason::InvalidImageUrl(format!("{}: missing host", raw)));
    }

    Ok(url)
}
