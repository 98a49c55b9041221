//! Run summary types
//!
//! A [`RunSummary`] is the one externally observable artifact of a pipeline run.
//! It is produced even when every record fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when a shutdown signal stopped dispatch before the worklist was exhausted
    pub cancelled: bool,
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    /// Starts an empty summary for a snapshot of `total` records
    pub fn begin(total: usize) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            total,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            cancelled: false,
            failures: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// Number of records that reached a terminal state so far
    pub fn completed(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    /// True once every record of the snapshot is accounted for
    pub fn is_balanced(&self) -> bool {
        self.completed() == self.total
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }
}

/// One failed record in a run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Failure category, mirroring the per-record error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Decode,
    EmptyImage,
    Store,
    Panicked,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Fetch => "fetch",
            FailureKind::Decode => "decode",
            FailureKind::EmptyImage => "empty_image",
            FailureKind::Store => "store",
            FailureKind::Panicked => "panicked",
        };
        f.write_str(name)
    }
}
