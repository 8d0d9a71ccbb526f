//! Multiplexed invocation entry point.
//!
//! `POST /invoke` receives one raw JSON event per call. Events carrying the
//! external scheduler's markers are routed to the maintenance tasks; any
//! other payload is handed to the synchronous request handler below, which
//! never sees scheduled traffic.

use crate::{
    errors::AppError,
    services::{AppState, item_service::ListItemsParams},
    tasks::dispatch::{self, InvocationEvent},
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use uuid::Uuid;

pub async fn invoke(State(state): State<AppState>, Json(event): Json<Value>) -> Response {
    match dispatch::classify(event) {
        InvocationEvent::Scheduled { rule } => {
            tracing::info!(rule = %rule, "scheduled trigger received");
            dispatch::run_scheduled(&state.metadata, &state.objects, &rule)
                .await
                .into_response()
        }
        InvocationEvent::Request(payload) => handle_request(&state, payload).await,
    }
}

/// Synchronous requests arriving on the invoke channel: a small JSON action
/// surface. The richer REST routes are the primary API.
async fn handle_request(state: &AppState, payload: Value) -> Response {
    match payload.get("action").and_then(Value::as_str) {
        Some("get_item") => {
            let id = payload
                .get("id")
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok());
            let Some(id) = id else {
                return AppError::new(StatusCode::BAD_REQUEST, "get_item requires a valid `id`")
                    .into_response();
            };
            match state.items.fetch_item(id).await {
                Ok(item) => Json(item).into_response(),
                Err(err) => AppError::from(err).into_response(),
            }
        }
        Some("list_items") => {
            let params = ListItemsParams {
                after: None,
                limit: 100,
            };
            match state.items.list_items(params).await {
                Ok(result) => Json(result.items).into_response(),
                Err(err) => AppError::from(err).into_response(),
            }
        }
        _ => AppError::new(StatusCode::BAD_REQUEST, "unsupported request payload").into_response(),
    }
}
