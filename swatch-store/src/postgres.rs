//! PostgreSQL record store
//!
//! Records live in the `products` table. Opaque catalog fields are kept in a
//! JSONB `attributes` column that the pipeline never touches.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use sqlx::PgPool;
use sqlx::types::Json;
use swatch_core::{HexColor, Record, RecordUpdate};

use crate::error::{Result, StoreError};
use crate::repository::RecordStore;

/// Record store backed by a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts records, or refreshes the image URL and attributes of existing ones
    ///
    /// Calculated colors of existing records are kept.
    /// Returns the number of records written.
    pub async fn upsert_records(&self, records: &[Record]) -> Result<u64> {
        let now = chrono::Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for record in records {
            let colors = record.calculated_colors.as_ref().map(|c| hex_strings(c));

            let result = sqlx::query(
                r#"
                INSERT INTO products (id, image_url, calculated_colors, attributes, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                ON CONFLICT (id) DO UPDATE SET
                    image_url = EXCLUDED.image_url,
                    attributes = EXCLUDED.attributes,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&record.id)
            .bind(&record.image_url)
            .bind(colors)
            .bind(Json(&record.attributes))
            .bind(now)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;

        tracing::info!("Seeded {} record(s)", written);
        Ok(written)
    }

    /// Deletes every record
    ///
    /// Returns the number of records removed.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM products")
            .execute(&self.pool)
            .await?;

        tracing::info!("Cleared {} record(s)", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Closes the underlying pool, waiting for checked-out connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch_all(&self) -> Result<Vec<Record>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, image_url, calculated_colors, attributes
            FROM products
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Record::try_from).collect()
    }

    async fn update_fields(&self, id: &str, update: RecordUpdate) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET calculated_colors = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(hex_strings(&update.calculated_colors))
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        Ok(())
    }
}

fn hex_strings(colors: &[HexColor]) -> Vec<String> {
    colors.iter().map(|c| c.as_str().to_string()).collect()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    image_url: Option<String>,
    calculated_colors: Option<Vec<String>>,
    attributes: Json<Map<String, JsonValue>>,
}

impl TryFrom<RecordRow> for Record {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self> {
        let calculated_colors = row
            .calculated_colors
            .map(|colors| {
                colors
                    .iter()
                    .map(|c| HexColor::parse(c))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .transpose()
            .map_err(|e| StoreError::InvalidData(format!("record {}: {}", row.id, e)))?;

        Ok(Record {
            id: row.id,
            image_url: row.image_url,
            calculated_colors,
            attributes: row.attributes.0,
        })
    }
}
