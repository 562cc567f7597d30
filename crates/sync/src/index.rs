//! Durable SKU → remote-identifier index.
//!
//! The web store offers no server-side lookup by Source identifier, so
//! this mapping is the only durable link between an item and its remote
//! product/variant. No transaction spans an index write and a remote API
//! call: a crash between a remote create and the matching `put` leaves an
//! orphan remote variant that the scheduled full sync re-converges later.
//! Concurrent writers for the *same* SKU are not serialized; the write is
//! a plain upsert and the last writer wins.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

use skubridge_core::SkuEntry;

/// Index storage failures.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("sku index query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// The SKU index contract: a keyed map with no cross-key guarantees.
#[allow(async_fn_in_trait)]
pub trait SkuIndex: Send + Sync {
    /// Look up the remote identifiers recorded for `sku`.
    async fn get(&self, sku: &str) -> Result<Option<SkuEntry>, IndexError>;

    /// Record (or overwrite) the remote identifiers for `sku`.
    async fn put(&self, sku: &str, entry: SkuEntry) -> Result<(), IndexError>;

    /// Forget `sku`. Deleting an absent key is a no-op.
    async fn delete(&self, sku: &str) -> Result<(), IndexError>;
}

/// Postgres-backed index over the `sku_index` table.
#[derive(Clone)]
pub struct PgSkuIndex {
    pool: PgPool,
}

impl PgSkuIndex {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SkuIndex for PgSkuIndex {
    async fn get(&self, sku: &str) -> Result<Option<SkuEntry>, IndexError> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT product_id, variant_id FROM sku_index WHERE sku = $1")
                .bind(sku)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(product_id, variant_id)| SkuEntry::new(product_id, variant_id)))
    }

    async fn put(&self, sku: &str, entry: SkuEntry) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO sku_index (sku, product_id, variant_id) VALUES ($1, $2, $3)
             ON CONFLICT (sku) DO UPDATE
             SET product_id = EXCLUDED.product_id, variant_id = EXCLUDED.variant_id",
        )
        .bind(sku)
        .bind(entry.product_id)
        .bind(entry.variant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, sku: &str) -> Result<(), IndexError> {
        sqlx::query("DELETE FROM sku_index WHERE sku = $1")
            .bind(sku)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory index for tests and local runs.
#[derive(Default)]
pub struct MemorySkuIndex {
    entries: RwLock<HashMap<String, SkuEntry>>,
}

impl MemorySkuIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SkuIndex for MemorySkuIndex {
    async fn get(&self, sku: &str) -> Result<Option<SkuEntry>, IndexError> {
        Ok(self.entries.read().await.get(sku).copied())
    }

    async fn put(&self, sku: &str, entry: SkuEntry) -> Result<(), IndexError> {
        self.entries.write().await.insert(sku.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, sku: &str) -> Result<(), IndexError> {
        self.entries.write().await.remove(sku);
        Ok(())
    }
}
