//! Weekly usage report.
//!
//! Read-only windowed statistics over both stores. Counts are independent
//! point-in-time reads; nothing here requires a consistent snapshot. The
//! report always returns 200 — a partial report with an error field is a
//! complete, successful response.

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;

use super::{MetadataGateway, ObjectGateway, TaskResponse};
use crate::services::metadata_store::MetadataError;

const REPORT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub generated_at: DateTime<Utc>,
    pub total_items: u64,
    pub items_created_in_window: u64,
    pub items_updated_in_window: u64,
    pub total_files: u64,
    pub total_file_size_bytes: u64,
    /// Null when the object-store listing failed; see `object_store_error`.
    pub object_store_count: Option<u64>,
    pub object_store_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_store_error: Option<String>,
}

pub async fn run<M, O>(metadata: &M, objects: &O, now: DateTime<Utc>) -> TaskResponse
where
    M: MetadataGateway,
    O: ObjectGateway,
{
    match gather(metadata, objects, now).await {
        Ok(report) => {
            tracing::info!(
                total_items = report.total_items,
                total_files = report.total_files,
                "weekly report finished"
            );
            TaskResponse::ok(&report)
        }
        Err(err) => {
            tracing::warn!(error = %err, "weekly report degraded to error stub");
            TaskResponse::new(
                StatusCode::OK,
                &json!({ "generatedAt": now, "error": err.to_string() }),
            )
        }
    }
}

/// Collect the report. Only metadata-store failures surface as `Err`; a
/// failed object-store listing is recorded on the report itself.
async fn gather<M, O>(
    metadata: &M,
    objects: &O,
    now: DateTime<Utc>,
) -> Result<MetricsReport, MetadataError>
where
    M: MetadataGateway,
    O: ObjectGateway,
{
    let window_start = now - Duration::days(REPORT_WINDOW_DAYS);

    let total_items = metadata.count_items().await?;
    let items_created_in_window = metadata.count_items_created_since(window_start).await?;
    let items_updated_in_window = metadata.count_items_updated_since(window_start).await?;
    let totals = metadata.attachment_totals().await?;

    let (object_store_count, object_store_size_bytes, object_store_error) =
        match objects.list_objects("", None).await {
            Ok(listed) => {
                let size: u64 = listed.iter().map(|o| o.size_bytes.max(0) as u64).sum();
                (Some(listed.len() as u64), Some(size), None)
            }
            Err(err) => (None, None, Some(err.to_string())),
        };

    Ok(MetricsReport {
        generated_at: now,
        total_items,
        items_created_in_window,
        items_updated_in_window,
        total_files: totals.files,
        total_file_size_bytes: totals.size_bytes,
        object_store_count,
        object_store_size_bytes,
        object_store_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::{FakeMetadata, FakeObjects};
    use crate::tasks::AttachmentTotals;

    #[tokio::test]
    async fn reports_counts_and_store_totals() {
        let now = Utc::now();
        let metadata = FakeMetadata {
            items: 12,
            created_in_window: 3,
            updated_in_window: 5,
            totals: AttachmentTotals {
                files: 4,
                size_bytes: 4096,
            },
            ..FakeMetadata::default()
        };
        let objects = FakeObjects::new(vec![
            FakeObjects::object("items/a", 1, now),
            FakeObjects::object("items/b", 1, now),
        ]);

        let response = run(&metadata, &objects, now).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["totalItems"], 12);
        assert_eq!(response.body["itemsCreatedInWindow"], 3);
        assert_eq!(response.body["itemsUpdatedInWindow"], 5);
        assert_eq!(response.body["totalFiles"], 4);
        assert_eq!(response.body["totalFileSizeBytes"], 4096);
        assert_eq!(response.body["objectStoreCount"], 2);
        assert_eq!(response.body["objectStoreSizeBytes"], 2);
        assert!(response.body.get("objectStoreError").is_none());
    }

    #[tokio::test]
    async fn listing_failure_still_returns_200() {
        let now = Utc::now();
        let metadata = FakeMetadata {
            items: 1,
            ..FakeMetadata::default()
        };
        let mut objects = FakeObjects::new(Vec::new());
        objects.list_error = Some("timeout".into());

        let response = run(&metadata, &objects, now).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["totalItems"], 1);
        assert!(response.body["objectStoreCount"].is_null());
        assert!(response.body["objectStoreSizeBytes"].is_null());
        assert!(
            response.body["objectStoreError"]
                .as_str()
                .unwrap()
                .contains("timeout")
        );
    }

    #[tokio::test]
    async fn metadata_failure_degrades_to_error_stub() {
        let now = Utc::now();
        let metadata = FakeMetadata {
            count_error: Some("database is locked".into()),
            ..FakeMetadata::default()
        };
        let objects = FakeObjects::new(Vec::new());

        let response = run(&metadata, &objects, now).await;

        assert_eq!(response.status, StatusCode::OK);
        assert!(
            response.body["error"]
                .as_str()
                .unwrap()
                .contains("database is locked")
        );
        assert!(response.body.get("totalItems").is_none());
    }
}
