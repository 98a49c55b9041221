//! Record store trait

use async_trait::async_trait;
use swatch_core::{Record, RecordUpdate};

use crate::error::Result;

/// Repository trait for catalog records
///
/// Implementations must apply [`RecordStore::update_fields`] as a targeted
/// field merge: only the fields named by the update change, every other
/// field of the record is preserved.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches a snapshot of every record in the store
    async fn fetch_all(&self) -> Result<Vec<Record>>;

    /// Applies a partial update to a single record
    ///
    /// # Arguments
    /// * `id` - The record's stable identifier
    /// * `update` - The fields to overwrite
    async fn update_fields(&self, id: &str, update: RecordUpdate) -> Result<()>;
}
