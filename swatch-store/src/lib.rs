//! Swatch record store
//!
//! Data access layer for catalog records. The pipeline only depends on the
//! [`RecordStore`] trait; this crate provides a PostgreSQL implementation for
//! production and an in-memory implementation for tests and dry runs.
//!
//! Also contains the plumbing around the store: pool creation, migrations and
//! seeding of sample catalog data.

pub mod db;
pub mod error;
mod memory;
mod postgres;
mod repository;
pub mod seed;

pub use error::{Result, StoreError};
pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;
pub use repository::RecordStore;
