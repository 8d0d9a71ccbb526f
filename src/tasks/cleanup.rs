//! Orphaned payload cleanup.
//!
//! The metadata store and the object store are updated independently, so
//! payloads can outlive the descriptors that referenced them (failed uploads,
//! interrupted deletes). This task diffs the two and removes what metadata no
//! longer references. The inverse case — a descriptor whose payload is gone —
//! is tolerated silently and left to the read path to surface.

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{MetadataGateway, ObjectGateway, TaskResponse};
use crate::services::item_service::ATTACHMENT_KEY_PREFIX;

/// Minimum object age before it is eligible for deletion.
const GRACE_PERIOD_HOURS: i64 = 24;

/// Accumulated outcome of one cleanup run.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub scanned_count: u64,
    pub deleted_count: u64,
    pub deleted_keys: Vec<String>,
    pub errors: Vec<CleanupFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFailure {
    /// Absent for failures not tied to a single object (fetching the
    /// referenced-key set, listing the store).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub message: String,
}

impl CleanupFailure {
    fn general(message: impl Into<String>) -> Self {
        Self {
            key: None,
            message: message.into(),
        }
    }

    fn for_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            message: message.into(),
        }
    }
}

impl CleanupReport {
    pub fn status_code(&self) -> StatusCode {
        if self.errors.is_empty() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn run<M, O>(metadata: &M, objects: &O, now: DateTime<Utc>) -> TaskResponse
where
    M: MetadataGateway,
    O: ObjectGateway,
{
    let report = reconcile(metadata, objects, now).await;
    tracing::info!(
        scanned = report.scanned_count,
        deleted = report.deleted_count,
        errors = report.errors.len(),
        "orphan cleanup finished"
    );
    TaskResponse::new(report.status_code(), &report)
}

/// Delete stored payloads no item references anymore.
///
/// A payload lands on disk before its descriptor row commits, so a young
/// unreferenced object may simply not be referenced *yet*; the grace window
/// keeps those out of reach. A single failed deletion never aborts the run,
/// but a failure to fetch either side of the diff ends it early with whatever
/// was accumulated.
pub async fn reconcile<M, O>(metadata: &M, objects: &O, now: DateTime<Utc>) -> CleanupReport
where
    M: MetadataGateway,
    O: ObjectGateway,
{
    let mut report = CleanupReport::default();

    let referenced = match metadata.attachment_keys().await {
        Ok(keys) => keys,
        Err(err) => {
            report
                .errors
                .push(CleanupFailure::general(format!("listing referenced keys: {err}")));
            return report;
        }
    };

    let listed = match objects.list_objects(ATTACHMENT_KEY_PREFIX, None).await {
        Ok(listed) => listed,
        Err(err) => {
            report
                .errors
                .push(CleanupFailure::general(format!("listing stored objects: {err}")));
            return report;
        }
    };
    report.scanned_count = listed.len() as u64;

    let grace = Duration::hours(GRACE_PERIOD_HOURS);
    for object in listed {
        if referenced.contains(&object.key) {
            continue;
        }
        if now.signed_duration_since(object.last_modified) < grace {
            tracing::debug!(key = %object.key, "orphan still inside grace window");
            continue;
        }
        match objects.delete_object(&object.key).await {
            Ok(()) => {
                tracing::debug!(key = %object.key, "deleted orphaned object");
                report.deleted_keys.push(object.key);
                report.deleted_count += 1;
            }
            Err(err) => {
                report
                    .errors
                    .push(CleanupFailure::for_key(object.key, err.to_string()));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::{FakeMetadata, FakeObjects};

    fn referenced(keys: &[&str]) -> FakeMetadata {
        FakeMetadata {
            referenced: keys.iter().map(|k| k.to_string()).collect(),
            ..FakeMetadata::default()
        }
    }

    #[tokio::test]
    async fn deletes_only_aged_unreferenced_objects() {
        let now = Utc::now();
        let metadata = referenced(&["items/a", "items/b"]);
        let objects = FakeObjects::new(vec![
            FakeObjects::object("items/a", 48, now),
            FakeObjects::object("items/b", 48, now),
            FakeObjects::object("items/c", 48, now),
        ]);

        let report = reconcile(&metadata, &objects, now).await;

        assert_eq!(report.scanned_count, 3);
        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.deleted_keys, vec!["items/c"]);
        assert!(report.errors.is_empty());
        assert_eq!(report.status_code(), StatusCode::OK);

        // second run with no intervening writes deletes nothing
        let report = reconcile(&metadata, &objects, now).await;
        assert_eq!(report.scanned_count, 2);
        assert_eq!(report.deleted_count, 0);
        assert!(report.deleted_keys.is_empty());
    }

    #[tokio::test]
    async fn grace_window_protects_young_orphans() {
        let now = Utc::now();
        let metadata = referenced(&[]);
        let objects = FakeObjects::new(vec![
            FakeObjects::object("items/young", 1, now),
            FakeObjects::object("items/old", 25, now),
        ]);

        let report = reconcile(&metadata, &objects, now).await;

        assert_eq!(report.scanned_count, 2);
        assert_eq!(report.deleted_keys, vec!["items/old"]);

        // still protected on a repeat run at the same instant
        let report = reconcile(&metadata, &objects, now).await;
        assert!(report.deleted_keys.is_empty());

        // ages out once the window passes
        let later = now + Duration::hours(24);
        let report = reconcile(&metadata, &objects, later).await;
        assert_eq!(report.deleted_keys, vec!["items/young"]);
    }

    #[tokio::test]
    async fn exactly_24h_old_is_eligible() {
        let now = Utc::now();
        let metadata = referenced(&[]);
        let objects = FakeObjects::new(vec![FakeObjects::object("items/edge", 24, now)]);

        let report = reconcile(&metadata, &objects, now).await;
        assert_eq!(report.deleted_keys, vec!["items/edge"]);
    }

    #[tokio::test]
    async fn one_failed_deletion_does_not_abort_the_run() {
        let now = Utc::now();
        let metadata = referenced(&[]);
        let mut objects = FakeObjects::new(vec![
            FakeObjects::object("items/c", 48, now),
            FakeObjects::object("items/d", 48, now),
        ]);
        objects.fail_deletes.insert("items/c".to_string());

        let report = reconcile(&metadata, &objects, now).await;

        assert_eq!(report.scanned_count, 2);
        assert_eq!(report.deleted_keys, vec!["items/d"]);
        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].key.as_deref(), Some("items/c"));
        assert_eq!(report.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        // failed key never shows up among the deleted ones
        assert!(!report.deleted_keys.contains(&"items/c".to_string()));
    }

    #[tokio::test]
    async fn metadata_failure_ends_the_run_before_listing() {
        let now = Utc::now();
        let metadata = FakeMetadata {
            keys_error: Some("connection reset".into()),
            ..FakeMetadata::default()
        };
        let objects = FakeObjects::new(vec![FakeObjects::object("items/x", 48, now)]);

        let report = reconcile(&metadata, &objects, now).await;

        assert_eq!(report.scanned_count, 0);
        assert_eq!(report.deleted_count, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].key.is_none());
        assert_eq!(objects.list_count(), 0);
        assert_eq!(report.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn listing_failure_yields_partial_report() {
        let now = Utc::now();
        let metadata = referenced(&["items/a"]);
        let mut objects = FakeObjects::new(Vec::new());
        objects.list_error = Some("storage unavailable".into());

        let report = reconcile(&metadata, &objects, now).await;

        assert_eq!(report.scanned_count, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("storage unavailable"));
    }

    #[tokio::test]
    async fn referenced_keys_survive_even_when_old() {
        let now = Utc::now();
        let metadata = referenced(&["items/keep"]);
        let objects = FakeObjects::new(vec![FakeObjects::object("items/keep", 1000, now)]);

        let report = reconcile(&metadata, &objects, now).await;

        assert_eq!(report.scanned_count, 1);
        assert_eq!(report.deleted_count, 0);
        assert!(objects.deleted_keys().is_empty());
    }

    #[tokio::test]
    async fn run_reports_through_the_task_response() {
        let now = Utc::now();
        let metadata = referenced(&[]);
        let objects = FakeObjects::new(vec![FakeObjects::object("items/c", 48, now)]);

        let response = run(&metadata, &objects, now).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["scannedCount"], 1);
        assert_eq!(response.body["deletedCount"], 1);
        assert_eq!(response.body["deletedKeys"][0], "items/c");
    }
}
