//! Defines routes for the item API and the invocation entry point.
//!
//! ## Structure
//! - **Item endpoints**
//!   - `POST   /items` — create item
//!   - `GET    /items` — list items (supports limit, cursor)
//!   - `GET    /items/{id}` — fetch item with its file descriptors
//!   - `PUT    /items/{id}` — update item
//!   - `DELETE /items/{id}` — delete item and its files
//!
//! - **Attachment endpoints**
//!   - `PUT    /items/{id}/files/{name}` — upload (streamed body)
//!   - `GET    /items/{id}/files/{name}` — download (streamed)
//!   - `DELETE /items/{id}/files/{name}` — detach
//!
//! - **Operational endpoints**
//!   - `GET  /healthz`, `GET /readyz`
//!   - `POST /invoke` — one raw event per call; scheduled triggers route to
//!     the maintenance tasks, anything else to the request handler

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        invoke_handlers::invoke,
        item_handlers::{
            create_item, delete_file, delete_item, download_file, get_item, list_items,
            update_item, upload_file,
        },
    },
    services::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build and return the router for the whole service.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // invocation entry point
        .route("/invoke", post(invoke))
        // item-level routes
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        // attachment routes
        .route(
            "/items/{id}/files/{name}",
            put(upload_file).get(download_file).delete(delete_file),
        )
}
