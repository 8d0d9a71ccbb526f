use crate::services::{item_service::ItemError, object_store::ObjectStoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<ItemError> for AppError {
    fn from(err: ItemError) -> Self {
        let status = match &err {
            ItemError::ItemNotFound(_) | ItemError::FileNotFound { .. } => StatusCode::NOT_FOUND,
            ItemError::InvalidItemName(_) | ItemError::InvalidFilename => StatusCode::BAD_REQUEST,
            ItemError::Storage(ObjectStoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ItemError::Storage(ObjectStoreError::InvalidKey) => StatusCode::BAD_REQUEST,
            ItemError::Sqlx(_) | ItemError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}
