//! src/services/metadata_store.rs
//!
//! MetadataStore — read-side gateway over the SQLite metadata the scheduled
//! tasks consume: liveness, the set of referenced attachment keys, and the
//! windowed counts behind the weekly report. Mutations stay in `ItemService`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;

use crate::tasks::{AttachmentTotals, MetadataGateway};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store unreachable: {0}")]
    Connection(String),
    #[error("metadata query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Thin handle over the shared pool. The pool re-establishes connections on
/// demand, so a cold handle behaves the same as a warm one.
#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<SqlitePool>,
}

impl MetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataGateway for MetadataStore {
    /// Cheapest possible round-trip. Acquiring a connection reconnects if the
    /// pool has none live; failure means the store is unreachable.
    async fn ping(&self) -> Result<(), MetadataError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await
            .map_err(|err| MetadataError::Connection(err.to_string()))?;
        Ok(())
    }

    /// Every attachment key currently referenced by an item, duplicates
    /// collapsed.
    async fn attachment_keys(&self) -> Result<HashSet<String>, MetadataError> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM item_files")
            .fetch_all(&*self.db)
            .await?;
        Ok(keys.into_iter().collect())
    }

    async fn count_items(&self) -> Result<u64, MetadataError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&*self.db)
            .await?;
        Ok(count as u64)
    }

    async fn count_items_created_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, MetadataError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE created_at >= ?")
            .bind(cutoff)
            .fetch_one(&*self.db)
            .await?;
        Ok(count as u64)
    }

    async fn count_items_updated_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, MetadataError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE updated_at >= ?")
            .bind(cutoff)
            .fetch_one(&*self.db)
            .await?;
        Ok(count as u64)
    }

    /// File count and summed payload sizes across all items. Items with no
    /// files contribute nothing to either aggregate.
    async fn attachment_totals(&self) -> Result<AttachmentTotals, MetadataError> {
        let (files, size_bytes): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM item_files",
        )
        .fetch_one(&*self.db)
        .await?;
        Ok(AttachmentTotals {
            files: files as u64,
            size_bytes: size_bytes as u64,
        })
    }
}
