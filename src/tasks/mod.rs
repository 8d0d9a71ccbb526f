//! Scheduled maintenance tasks and the dispatcher that routes to them.
//!
//! ## Structure
//! - `dispatch` — classifies each incoming invocation event and routes it to
//!   exactly one task (or back to synchronous request handling)
//! - `health` — probes the metadata store and object store independently
//! - `cleanup` — deletes stored payloads no item references anymore
//! - `report` — windowed usage statistics, read-only
//!
//! Tasks consume the two gateways through the traits below so they can be
//! exercised against in-memory fakes. Every task converts its own failures
//! into fields of its report; nothing propagates past the dispatcher. A
//! non-200 status means "ran to completion and found a problem", never
//! "crashed".

pub mod cleanup;
pub mod dispatch;
pub mod health;
pub mod report;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashSet;

use crate::services::metadata_store::MetadataError;
use crate::services::object_store::{ObjectStoreError, StoredObject};

/// Read access to item metadata, as the tasks see it.
#[async_trait]
pub trait MetadataGateway: Send + Sync {
    /// Verify the store is reachable, reconnecting if needed.
    async fn ping(&self) -> Result<(), MetadataError>;

    /// Every attachment key referenced by any item, duplicates collapsed.
    async fn attachment_keys(&self) -> Result<HashSet<String>, MetadataError>;

    async fn count_items(&self) -> Result<u64, MetadataError>;

    async fn count_items_created_since(&self, cutoff: DateTime<Utc>)
    -> Result<u64, MetadataError>;

    async fn count_items_updated_since(&self, cutoff: DateTime<Utc>)
    -> Result<u64, MetadataError>;

    async fn attachment_totals(&self) -> Result<AttachmentTotals, MetadataError>;
}

/// List/delete access to stored payloads, as the tasks see it.
#[async_trait]
pub trait ObjectGateway: Send + Sync {
    async fn list_objects(
        &self,
        prefix: &str,
        max_keys: Option<usize>,
    ) -> Result<Vec<StoredObject>, ObjectStoreError>;

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// File count and summed payload sizes across all items.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentTotals {
    pub files: u64,
    pub size_bytes: u64,
}

/// Outcome of one scheduled task run: a status code plus the serialized
/// report. Maps 1:1 onto the HTTP response of the invoke endpoint.
#[derive(Debug)]
pub struct TaskResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TaskResponse {
    pub fn new(status: StatusCode, report: &impl Serialize) -> Self {
        let body = serde_json::to_value(report)
            .unwrap_or_else(|err| json!({ "error": format!("serializing report: {err}") }));
        Self { status, body }
    }

    pub fn ok(report: &impl Serialize) -> Self {
        Self::new(StatusCode::OK, report)
    }
}

impl IntoResponse for TaskResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
