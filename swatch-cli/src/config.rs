//! Configuration module
//!
//! Handles CLI configuration and the database connection it implies.

use anyhow::{Context, Result};
use swatch_store::{PgRecordStore, db};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Record store connection string
    pub database_url: String,
}

impl Config {
    /// Connects to the record store and makes sure the schema exists
    ///
    /// # Arguments
    /// * `max_connections` - Pool size; commands that run the pipeline need more
    pub async fn connect(&self, max_connections: u32) -> Result<PgRecordStore> {
        let pool = db::create_pool(&self.database_url, max_connections)
            .await
            .with_context(|| format!("Failed to connect to {}", redact(&self.database_url)))?;

        db::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(PgRecordStore::new(pool))
    }
}

/// Hides the password part of a connection string
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            match credentials.split_once(':') {
                Some((user, _)) => format!("{}{}:***{}", &url[..scheme_end + 3], user, &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
