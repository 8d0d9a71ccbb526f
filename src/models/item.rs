//! Represents an item — the top-level catalog record files attach to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single catalog item.
///
/// Items own their attached files; deleting an item removes its file
/// descriptors and (best-effort) the stored payloads.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Item {
    /// Unique identifier (UUID for internal DB use and in URLs).
    pub id: Uuid,

    /// Human-readable item name.
    pub name: String,

    /// Optional free-form description.
    pub description: Option<String>,

    /// When this item was created.
    pub created_at: DateTime<Utc>,

    /// When this item or its attachments were last modified.
    pub updated_at: DateTime<Utc>,
}
