//! Scheduled health check.
//!
//! Two independent probes — the metadata store and the object store — reduced
//! to a single overall verdict. The 200/500 status is informational: a failed
//! probe is the expected, successfully-reported outcome, not a crash.

use axum::http::StatusCode;
use serde::Serialize;
use std::collections::HashMap;

use super::{MetadataGateway, ObjectGateway, TaskResponse};
use crate::services::item_service::ATTACHMENT_KEY_PREFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthCheck {
    fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            detail: None,
        }
    }

    fn unhealthy(detail: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            detail: Some(detail),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub checks: HashMap<&'static str, HealthCheck>,
    pub overall: HealthStatus,
}

impl HealthReport {
    pub fn status_code(&self) -> StatusCode {
        match self.overall {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub async fn run<M, O>(metadata: &M, objects: &O) -> TaskResponse
where
    M: MetadataGateway,
    O: ObjectGateway,
{
    let report = check(metadata, objects).await;
    tracing::info!(overall = ?report.overall, "health check finished");
    TaskResponse::new(report.status_code(), &report)
}

/// Run both probes and reduce.
///
/// The probes are independent: one failing never prevents the other from
/// running or being reported. Overall is healthy iff every check is.
pub async fn check<M, O>(metadata: &M, objects: &O) -> HealthReport
where
    M: MetadataGateway,
    O: ObjectGateway,
{
    let database = match metadata.ping().await {
        Ok(()) => HealthCheck::healthy(),
        Err(err) => HealthCheck::unhealthy(err.to_string()),
    };

    // minimal listing; an empty result is just as healthy as a populated one
    let object_store = match objects.list_objects(ATTACHMENT_KEY_PREFIX, Some(1)).await {
        Ok(_) => HealthCheck::healthy(),
        Err(err) => HealthCheck::unhealthy(err.to_string()),
    };

    let overall = if database.status == HealthStatus::Healthy
        && object_store.status == HealthStatus::Healthy
    {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    let mut checks = HashMap::new();
    checks.insert("database", database);
    checks.insert("object_store", object_store);

    HealthReport { checks, overall }
}
