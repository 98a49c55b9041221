//! Per-record outcomes
//!
//! Every enrichment task ends in exactly one [`EnrichmentOutcome`]. Outcomes are
//! transient report values that live for one run and feed the run summary.

use std::fmt;

use swatch_core::{FailureKind, FailureRecord, HexColor};
use swatch_store::StoreError;
use thiserror::Error;

use crate::fetcher::FetchError;
use crate::palette::ExtractError;

/// Stages of an enrichment task, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStage {
    Pending,
    Fetching,
    Extracting,
    Encoding,
    Persisting,
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStage::Pending => "pending",
            TaskStage::Fetching => "fetching",
            TaskStage::Extracting => "extracting",
            TaskStage::Encoding => "encoding",
            TaskStage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// Why a record was not processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingImageUrl,
    InvalidImageUrl(String),
    /// A shutdown signal stopped dispatch before the record was reached
    Cancelled,
    /// The run aborted before the record was reached
    RunAborted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingImageUrl => write!(f, "missing image url"),
            SkipReason::InvalidImageUrl(detail) => write!(f, "invalid image url: {}", detail),
            SkipReason::Cancelled => write!(f, "run cancelled before dispatch"),
            SkipReason::RunAborted => write!(f, "run aborted before dispatch"),
        }
    }
}

/// Errors that fail a single record
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The task or its extraction worker panicked
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

impl TaskError {
    /// Summary category of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::Fetch(_) => FailureKind::Fetch,
            TaskError::Extract(ExtractError::Decode(_)) => FailureKind::Decode,
            TaskError::Extract(ExtractError::EmptyImage) => FailureKind::EmptyImage,
            TaskError::Store(_) => FailureKind::Store,
            TaskError::WorkerPanicked(_) => FailureKind::Panicked,
        }
    }

    /// The stage that produced this error, when known
    pub fn stage(&self) -> Option<TaskStage> {
        match self {
            TaskError::Fetch(_) => Some(TaskStage::Fetching),
            TaskError::Extract(_) => Some(TaskStage::Extracting),
            TaskError::Store(_) => Some(TaskStage::Persisting),
            TaskError::WorkerPanicked(_) => None,
        }
    }
}

/// Terminal result of processing one record
#[derive(Debug)]
pub enum EnrichmentOutcome {
    Success { id: String, colors: Vec<HexColor> },
    Skipped { id: String, reason: SkipReason },
    Failed { id: String, error: TaskError },
}

impl EnrichmentOutcome {
    pub fn id(&self) -> &str {
        match self {
            EnrichmentOutcome::Success { id, .. }
            | EnrichmentOutcome::Skipped { id, .. }
            | EnrichmentOutcome::Failed { id, .. } => id,
        }
    }

    /// Converts a failed outcome into its summary entry
    pub fn failure_record(&self) -> Option<FailureRecord> {
        match self {
            EnrichmentOutcome::Failed { id, error } => Some(FailureRecord {
                id: id.clone(),
                kind: error.kind(),
                reason: error.to_string(),
            }),
            _ => None,
        }
    }
}
