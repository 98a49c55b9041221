//! In-memory record store
//!
//! Keeps records in an ordered map behind an async lock. Applies the same
//! targeted-merge semantics as the PostgreSQL store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use swatch_core::{Record, RecordUpdate};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::repository::RecordStore;

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<String, Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with records, keyed by id
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let records = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Inserts or replaces a whole record
    pub async fn insert(&self, record: Record) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    /// Returns a copy of a single record
    pub async fn get(&self, id: &str) -> Option<Record> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_all(&self) -> Result<Vec<Record>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn update_fields(&self, id: &str, update: RecordUpdate) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        record.calculated_colors = Some(update.calculated_colors);
        Ok(())
    }
}
