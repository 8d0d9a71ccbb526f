//! src/services/item_service.rs
//!
//! ItemService — CRUD over items and their attached files. Descriptor rows
//! live in SQLite; payload bytes go through `FsObjectStore`. On upload the
//! payload is written before the descriptor row commits, so a crash in
//! between leaves an unreferenced payload behind for the cleanup task to
//! collect once it ages out.

use crate::models::{file::ItemFile, item::Item};
use crate::services::object_store::{FsObjectStore, ObjectStoreError};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{io, sync::Arc};
use thiserror::Error;
use tokio::fs::File;
use tracing::debug;
use uuid::Uuid;

/// Key prefix every attachment payload lives under.
pub const ATTACHMENT_KEY_PREFIX: &str = "items/";

const MAX_ITEM_NAME_LEN: usize = 255;
const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("item `{0}` not found")]
    ItemNotFound(Uuid),
    #[error("file `{filename}` not found on item `{item_id}`")]
    FileNotFound { item_id: Uuid, filename: String },
    #[error("item name invalid: {0}")]
    InvalidItemName(String),
    #[error("invalid filename")]
    InvalidFilename,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] ObjectStoreError),
}

pub type ItemResult<T> = Result<T, ItemError>;

#[derive(Clone, Debug)]
pub struct ListItemsParams {
    /// Item id to resume after, from a previous page's cursor.
    pub after: Option<String>,
    pub limit: usize,
}

#[derive(Debug)]
pub struct ListItemsResult {
    pub items: Vec<Item>,
    pub is_truncated: bool,
    pub next_cursor: Option<String>,
}

/// ItemService provides the CRUD surface:
/// - Create/get/list/update/delete items (SQLite rows)
/// - Attach a file (streams bytes to the object store, upserts a descriptor)
/// - Open an attached file for reading
/// - Detach a file (removes descriptor, best-effort payload delete)
#[derive(Clone)]
pub struct ItemService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Payload storage.
    pub objects: FsObjectStore,
}

/// Build the storage key for an attachment.
pub fn attachment_key(item_id: Uuid, filename: &str) -> String {
    format!("{ATTACHMENT_KEY_PREFIX}{item_id}/{filename}")
}

impl ItemService {
    pub fn new(db: Arc<SqlitePool>, objects: FsObjectStore) -> Self {
        Self { db, objects }
    }

    fn ensure_name_valid(name: &str) -> ItemResult<()> {
        if name.trim().is_empty() {
            return Err(ItemError::InvalidItemName("cannot be empty".into()));
        }
        if name.len() > MAX_ITEM_NAME_LEN {
            return Err(ItemError::InvalidItemName(format!(
                "must be at most {MAX_ITEM_NAME_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Filenames become the last key segment, so they must be a single path
    /// component.
    fn ensure_filename_safe(filename: &str) -> ItemResult<()> {
        if filename.is_empty() || filename.len() > MAX_FILENAME_LEN {
            return Err(ItemError::InvalidFilename);
        }
        if filename.contains('/') || filename.contains("..") {
            return Err(ItemError::InvalidFilename);
        }
        if filename
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ItemError::InvalidFilename);
        }
        Ok(())
    }

    pub async fn create_item(&self, name: &str, description: Option<String>) -> ItemResult<Item> {
        Self::ensure_name_valid(name)?;
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            description,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO items (id, name, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.db)
        .await?;
        Ok(item)
    }

    /// Fetch a single item. Returns ItemNotFound if missing.
    pub async fn fetch_item(&self, id: Uuid) -> ItemResult<Item> {
        sqlx::query_as::<_, Item>(
            "SELECT id, name, description, created_at, updated_at FROM items WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => ItemError::ItemNotFound(id),
            other => ItemError::Sqlx(other),
        })
    }

    /// List items ordered by id, one page at a time.
    ///
    /// Fetches one row beyond the page size to detect truncation; the cursor
    /// of a truncated page is the last returned item's id.
    pub async fn list_items(&self, params: ListItemsParams) -> ItemResult<ListItemsResult> {
        let limit = params.limit.clamp(1, 1000);
        let fetch_limit = limit + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, description, created_at, updated_at FROM items",
        );
        if let Some(after) = &params.after {
            builder.push(" WHERE id > ");
            builder.push_bind(after);
        }
        builder.push(" ORDER BY id ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut items: Vec<Item> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut is_truncated = false;
        if items.len() == fetch_limit {
            items.pop();
            is_truncated = true;
        }
        let next_cursor = if is_truncated {
            items.last().map(|item| item.id.to_string())
        } else {
            None
        };

        Ok(ListItemsResult {
            items,
            is_truncated,
            next_cursor,
        })
    }

    /// Update name and/or description; `None` leaves a field unchanged.
    pub async fn update_item(
        &self,
        id: Uuid,
        name: Option<String>,
        description: Option<String>,
    ) -> ItemResult<Item> {
        let current = self.fetch_item(id).await?;
        let name = match name {
            Some(name) => {
                Self::ensure_name_valid(&name)?;
                name.trim().to_string()
            }
            None => current.name,
        };
        let description = description.or(current.description);

        sqlx::query_as::<_, Item>(
            "UPDATE items SET name = ?, description = ?, updated_at = ?
             WHERE id = ?
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(&name)
        .bind(&description)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(ItemError::Sqlx)
    }

    /// Delete an item, its descriptors, and (best-effort) its payloads.
    ///
    /// Descriptors go first: a payload whose delete fails is then
    /// unreferenced and falls to the cleanup task once it ages out.
    pub async fn delete_item(&self, id: Uuid) -> ItemResult<()> {
        let item = self.fetch_item(id).await?;
        let files = self.item_files(id).await?;

        sqlx::query("DELETE FROM item_files WHERE item_id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        for file in &files {
            if let Err(err) = self.objects.delete(&file.key).await {
                debug!("failed to remove payload {} for deleted item {}: {}", file.key, item.id, err);
            }
        }
        Ok(())
    }

    /// Descriptors of every file attached to an item, ordered by filename.
    pub async fn item_files(&self, item_id: Uuid) -> ItemResult<Vec<ItemFile>> {
        let files = sqlx::query_as::<_, ItemFile>(
            "SELECT id, item_id, key, filename, content_type, size_bytes, etag, last_modified
             FROM item_files WHERE item_id = ? ORDER BY filename ASC",
        )
        .bind(item_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(files)
    }

    async fn fetch_file(&self, item_id: Uuid, filename: &str) -> ItemResult<ItemFile> {
        sqlx::query_as::<_, ItemFile>(
            "SELECT id, item_id, key, filename, content_type, size_bytes, etag, last_modified
             FROM item_files WHERE item_id = ? AND filename = ?",
        )
        .bind(item_id)
        .bind(filename)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => ItemError::FileNotFound {
                item_id,
                filename: filename.to_string(),
            },
            other => ItemError::Sqlx(other),
        })
    }

    /// Stream-attach a file to an item.
    ///
    /// Writes the payload, then upserts the descriptor row (overwrite
    /// semantics for a repeated filename) and bumps the item's `updated_at`.
    /// A descriptor write failure removes the fresh payload best-effort.
    pub async fn attach_file<S>(
        &self,
        item_id: Uuid,
        filename: &str,
        content_type: Option<String>,
        stream: S,
    ) -> ItemResult<ItemFile>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::ensure_filename_safe(filename)?;
        let item = self.fetch_item(item_id).await?;

        let key = attachment_key(item.id, filename);
        let written = self.objects.put(&key, stream).await?;
        let now = Utc::now();

        let insert_result = sqlx::query_as::<_, ItemFile>(
            r#"
            INSERT INTO item_files (
                id, item_id, key, filename, content_type, size_bytes, etag, last_modified
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            RETURNING id, item_id, key, filename, content_type, size_bytes, etag, last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(item.id)
        .bind(&key)
        .bind(filename)
        .bind(&content_type)
        .bind(written.size_bytes)
        .bind(&written.etag)
        .bind(now)
        .fetch_one(&*self.db)
        .await;

        let file = match insert_result {
            Ok(file) => file,
            Err(err) => {
                if let Err(cleanup_err) = self.objects.delete(&key).await {
                    debug!("failed to remove payload {} after descriptor error: {}", key, cleanup_err);
                }
                return Err(ItemError::Sqlx(err));
            }
        };

        sqlx::query("UPDATE items SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(item.id)
            .execute(&*self.db)
            .await?;

        Ok(file)
    }

    /// Fetch a file for reading: descriptor plus an opened payload handle.
    pub async fn file_reader(&self, item_id: Uuid, filename: &str) -> ItemResult<(ItemFile, File)> {
        let file = self.fetch_file(item_id, filename).await?;
        let reader = self.objects.reader(&file.key).await.map_err(|err| match err {
            ObjectStoreError::NotFound(_) => ItemError::FileNotFound {
                item_id,
                filename: filename.to_string(),
            },
            other => ItemError::Storage(other),
        })?;
        Ok((file, reader))
    }

    /// Remove a file descriptor and (best-effort) its payload.
    pub async fn detach_file(&self, item_id: Uuid, filename: &str) -> ItemResult<ItemFile> {
        let file = self.fetch_file(item_id, filename).await?;

        sqlx::query("DELETE FROM item_files WHERE id = ?")
            .bind(file.id)
            .execute(&*self.db)
            .await?;
        sqlx::query("UPDATE items SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(item_id)
            .execute(&*self.db)
            .await?;

        if let Err(err) = self.objects.delete(&file.key).await {
            debug!("failed to remove payload {} for detached file: {}", file.key, err);
        }
        Ok(file)
    }
}
