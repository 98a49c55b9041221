//! Enrichment context
//!
//! Everything a task needs besides its own record:
//! - Record store handle for persisting palettes
//! - Image fetcher
//! - Palette extractor and the permits bounding concurrent extractions
//! - Persist stage timeout
//!
//! One context is built per run and shared by all of that run's tasks.

use std::sync::Arc;
use std::time::Duration;

use swatch_core::{HexColor, RecordUpdate, Rgb};
use swatch_store::{RecordStore, StoreError};
use tokio::sync::Semaphore;

use crate::fetcher::ImageFetcher;
use crate::outcome::TaskError;
use crate::palette::PaletteExtractor;

pub struct EnrichmentContext {
    pub store: Arc<dyn RecordStore>,
    pub fetcher: Arc<dyn ImageFetcher>,
    extractor: Arc<dyn PaletteExtractor>,
    extract_permits: Arc<Semaphore>,
    persist_timeout: Duration,
}

impl EnrichmentContext {
    /// Creates a new enrichment context
    ///
    /// # Arguments
    /// * `store` - Record store updated by every task
    /// * `fetcher` - Image source
    /// * `extractor` - Palette extractor, run on the blocking pool
    /// * `extract_workers` - Maximum concurrent extractions
    /// * `persist_timeout` - Deadline for one record update
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn ImageFetcher>,
        extractor: Arc<dyn PaletteExtractor>,
        extract_workers: usize,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            extractor,
            extract_permits: Arc::new(Semaphore::new(extract_workers.max(1))),
            persist_timeout,
        }
    }

    /// Extracts a palette on the blocking pool
    ///
    /// The image buffer moves into the worker and is dropped when it finishes.
    pub async fn extract(&self, bytes: Vec<u8>) -> Result<Vec<Rgb>, TaskError> {
        let _permit = self
            .extract_permits
            .acquire()
            .await
            .map_err(|_| TaskError::WorkerPanicked("extraction pool closed".to_string()))?;

        let extractor = Arc::clone(&self.extractor);
        let palette = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| TaskError::WorkerPanicked(e.to_string()))??;

        Ok(palette)
    }

    /// Overwrites a record's calculated colors, bounded by the persist timeout
    pub async fn persist(&self, id: &str, colors: Vec<HexColor>) -> Result<(), StoreError> {
        let update = RecordUpdate {
            calculated_colors: colors,
        };

        match tokio::time::timeout(self.persist_timeout, self.store.update_fields(id, update)).await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.persist_timeout)),
        }
    }
}
