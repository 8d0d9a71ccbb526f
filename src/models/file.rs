//! Represents a file attached to an item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Descriptor for a file attached to an item.
///
/// The record describes a stored payload, not the payload bytes themselves.
/// Two descriptors refer to the same stored object iff their `key` strings
/// are equal; no other field participates in identity.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ItemFile {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key linking to the owning item.
    pub item_id: Uuid,

    /// Storage key of the payload (path-like, unique across the store).
    pub key: String,

    /// Original filename as uploaded.
    pub filename: String,

    /// Content type (MIME type).
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 checksum for integrity verification.
    pub etag: Option<String>,

    /// Timestamp when the payload was last written.
    pub last_modified: DateTime<Utc>,
}
