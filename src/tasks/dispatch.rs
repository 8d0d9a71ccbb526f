//! Invocation event classification and routing.
//!
//! Every invocation arrives as one raw JSON event. Events carrying the
//! scheduler's origin markers are scheduled triggers; everything else is a
//! synchronous request whose payload passes through untouched. The rule name
//! carried by a trigger is untrusted routing input only — it selects a task
//! through the fixed table below and is never forwarded into a destructive
//! operation.

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{Value, json};

use super::{MetadataGateway, ObjectGateway, TaskResponse, cleanup, health, report};

pub const SCHEDULED_EVENT_SOURCE: &str = "aws.events";
pub const SCHEDULED_EVENT_DETAIL_TYPE: &str = "Scheduled Event";

pub const HEALTH_CHECK_RULE: &str = "health-check";
pub const DAILY_CLEANUP_RULE: &str = "daily-cleanup";
pub const WEEKLY_REPORT_RULE: &str = "weekly-report";

/// One classified invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationEvent {
    /// A trigger from the external scheduler, carrying the rule that fired.
    Scheduled { rule: String },
    /// Anything else; the payload is not inspected here.
    Request(Value),
}

/// Classify a raw invocation event.
///
/// An event is scheduled iff its `source` matches the scheduler origin or its
/// `detail-type` matches the scheduled-event tag.
pub fn classify(payload: Value) -> InvocationEvent {
    let source = payload.get("source").and_then(Value::as_str);
    let detail_type = payload.get("detail-type").and_then(Value::as_str);
    let scheduled = source == Some(SCHEDULED_EVENT_SOURCE)
        || detail_type == Some(SCHEDULED_EVENT_DETAIL_TYPE);
    if !scheduled {
        return InvocationEvent::Request(payload);
    }

    let rule = payload
        .get("resources")
        .and_then(Value::as_array)
        .and_then(|resources| resources.first())
        .and_then(Value::as_str)
        .map(rule_name)
        .unwrap_or_default()
        .to_string();
    InvocationEvent::Scheduled { rule }
}

/// Trailing path segment of a scheduler resource identifier:
/// `arn:...:rule/daily-cleanup` yields `daily-cleanup`. An identifier
/// without `/` is returned whole.
fn rule_name(resource: &str) -> &str {
    resource.rsplit('/').next().unwrap_or(resource)
}

/// Run the task registered for `rule`.
///
/// Unknown rules are a successful no-op: they may belong to future or renamed
/// schedules, and must neither error nor fall through to request handling.
pub async fn run_scheduled<M, O>(metadata: &M, objects: &O, rule: &str) -> TaskResponse
where
    M: MetadataGateway,
    O: ObjectGateway,
{
    match rule {
        HEALTH_CHECK_RULE => health::run(metadata, objects).await,
        DAILY_CLEANUP_RULE => cleanup::run(metadata, objects, Utc::now()).await,
        WEEKLY_REPORT_RULE => report::run(metadata, objects, Utc::now()).await,
        other => {
            tracing::warn!(rule = other, "no scheduled task registered for rule");
            TaskResponse::new(
                StatusCode::OK,
                &json!({
                    "message": format!("no scheduled task registered for rule `{other}`"),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::{FakeMetadata, FakeObjects};

    #[test]
    fn classifies_by_source_marker() {
        let event = json!({
            "source": SCHEDULED_EVENT_SOURCE,
            "resources": ["arn:aws:events:us-east-1:123:rule/daily-cleanup"],
        });
        assert_eq!(
            classify(event),
            InvocationEvent::Scheduled {
                rule: "daily-cleanup".into()
            }
        );
    }

    #[test]
    fn classifies_by_detail_type_marker() {
        let event = json!({
            "detail-type": SCHEDULED_EVENT_DETAIL_TYPE,
            "resources": ["arn:aws:events:us-east-1:123:rule/weekly-report"],
        });
        assert_eq!(
            classify(event),
            InvocationEvent::Scheduled {
                rule: "weekly-report".into()
            }
        );
    }

    #[test]
    fn unmarked_event_is_a_request() {
        let payload = json!({ "action": "get_item", "id": "abc" });
        assert_eq!(classify(payload.clone()), InvocationEvent::Request(payload));
    }

    #[test]
    fn rule_name_without_slash_is_returned_whole() {
        let event = json!({
            "source": SCHEDULED_EVENT_SOURCE,
            "resources": ["health-check"],
        });
        assert_eq!(
            classify(event),
            InvocationEvent::Scheduled {
                rule: "health-check".into()
            }
        );
    }

    #[test]
    fn empty_resource_list_yields_empty_rule() {
        let event = json!({ "source": SCHEDULED_EVENT_SOURCE, "resources": [] });
        assert_eq!(classify(event), InvocationEvent::Scheduled { rule: "".into() });

        let event = json!({ "source": SCHEDULED_EVENT_SOURCE });
        assert_eq!(classify(event), InvocationEvent::Scheduled { rule: "".into() });
    }

    #[tokio::test]
    async fn unknown_rule_is_a_successful_noop() {
        let metadata = FakeMetadata::default();
        let objects = FakeObjects::new(Vec::new());

        let response = run_scheduled(&metadata, &objects, "renamed-rule").await;

        assert_eq!(response.status, StatusCode::OK);
        let message = response.body["message"].as_str().unwrap();
        assert!(message.contains("renamed-rule"));
        assert_eq!(objects.list_count(), 0);
        assert!(objects.deleted_keys().is_empty());
    }

    #[tokio::test]
    async fn empty_rule_takes_the_noop_path() {
        let metadata = FakeMetadata::default();
        let objects = FakeObjects::new(Vec::new());

        let response = run_scheduled(&metadata, &objects, "").await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(objects.list_count(), 0);
    }
}
