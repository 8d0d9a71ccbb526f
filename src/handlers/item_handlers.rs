//! HTTP handlers for item and attachment operations.
//! Streams file bodies to avoid buffering in memory and delegates storage
//! concerns to `ItemService`.

use crate::{
    errors::AppError,
    models::{file::ItemFile, item::Item},
    services::{AppState, item_service::ListItemsParams},
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateItemReq {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemReq {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Query params accepted by the item listing.
#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListItemsResponse {
    pub items: Vec<Item>,
    pub is_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemWithFiles {
    #[serde(flatten)]
    pub item: Item,
    pub files: Vec<ItemFile>,
}

/// POST `/items` — create an item.
pub async fn create_item(
    State(state): State<AppState>,
    Json(req): Json<CreateItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let item = state.items.create_item(&req.name, req.description).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET `/items` — list items, supports ?limit=&cursor=
pub async fn list_items(
    State(state): State<AppState>,
    Query(q): Query<ListItemsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let after = q.cursor.as_deref().map(decode_cursor);
    let params = ListItemsParams {
        after,
        limit: q.limit.unwrap_or(100).clamp(1, 1000),
    };
    let result = state.items.list_items(params).await?;
    Ok(Json(ListItemsResponse {
        items: result.items,
        is_truncated: result.is_truncated,
        next_cursor: result.next_cursor.as_deref().map(encode_cursor),
    }))
}

/// GET `/items/{id}` — item plus its attached-file descriptors.
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let item = state.items.fetch_item(id).await?;
    let files = state.items.item_files(id).await?;
    Ok(Json(ItemWithFiles { item, files }))
}

/// PUT `/items/{id}` — update name/description.
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let item = state.items.update_item(id, req.name, req.description).await?;
    Ok(Json(item))
}

/// DELETE `/items/{id}` — remove item, descriptors, payloads.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.items.delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT `/items/{id}/files/{name}` — attach a file, streaming the body.
pub async fn upload_file(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));

    let file = state
        .items
        .attach_file(id, &name, content_type, stream)
        .await?;

    let mut resp_headers = HeaderMap::new();
    if let Some(etag) = file.etag.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
            resp_headers.insert(header::ETAG, value);
        }
    }
    Ok((StatusCode::CREATED, resp_headers, Json(file)))
}

/// GET `/items/{id}/files/{name}` — stream an attached file out.
pub async fn download_file(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let (meta, file) = state.items.file_reader(id, &name).await?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_file_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// DELETE `/items/{id}/files/{name}` — detach a file.
pub async fn delete_file(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    state.items.detach_file(id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn set_file_headers(headers: &mut HeaderMap, meta: &ItemFile) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Some(etag) = meta.etag.as_ref() {
        let quoted = format!("\"{etag}\"");
        if let Ok(value) = HeaderValue::from_str(&quoted) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}

fn encode_cursor(cursor: &str) -> String {
    general_purpose::STANDARD.encode(cursor)
}

fn decode_cursor(cursor: &str) -> String {
    general_purpose::STANDARD
        .decode(cursor)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| cursor.to_string())
}
