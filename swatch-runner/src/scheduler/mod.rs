//! Scheduler layer for the runner
//!
//! This layer reads the record snapshot, dispatches one enrichment task per
//! record under the concurrency cap and folds their outcomes into a run
//! summary. It also owns graceful shutdown and store-failure escalation.

pub mod pipeline;
pub mod shutdown;

pub use pipeline::{PipelineScheduler, RunError, SchedulerSettings};
pub use shutdown::shutdown_on_ctrl_c;
