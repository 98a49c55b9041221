//! Swatch Core
//!
//! Core types for the swatch catalog enrichment pipeline.
//!
//! This crate contains:
//! - Colors: RGB triples, validated hex colors and the RGB -> hex codec
//! - Records: catalog entries as read from and written to the record store
//! - Summary: the aggregate report produced by one pipeline run

pub mod color;
pub mod error;
pub mod record;
pub mod summary;

pub use color::{HexColor, Rgb, to_hex};
pub use error::ColorError;
pub use record::{Record, RecordUpdate};
pub use summary::{FailureKind, FailureRecord, RunSummary};
