use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use serde::Serialize;
use serde_json::Value;
use telesink_core::model::record::apply_defaults;
use telesink_core::model::{Payload, TelemetryRecord};
use telesink_core::time;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StoredResponse {
    pub message: &'static str,
    pub entry: TelemetryRecord,
}

/// Whitespace-only bodies count as `{}`. Anything else must be a JSON object.
pub fn parse_body(body: &[u8]) -> Result<Payload, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::debug!("rejected non-object json body");
            Err(ApiError::BadBody)
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejected unparseable body");
            Err(ApiError::BadBody)
        }
    }
}

/// Stamps defaults onto the payload, stores it and returns the stored record.
pub async fn ingest(
    state: &AppState,
    path: &str,
    mut data: Payload,
) -> Result<TelemetryRecord, ApiError> {
    let received_at = time::now();
    apply_defaults(&mut data, &state.settings.machine_id, received_at);
    let stored = state
        .store
        .append(TelemetryRecord::new(path, data, received_at))
        .await?;
    tracing::debug!(id = stored.id, path = %stored.path, "record stored");
    Ok(stored)
}

async fn store_entry(
    state: &AppState,
    path: &str,
    body: &[u8],
) -> Result<Json<StoredResponse>, ApiError> {
    let data = parse_body(body)?;
    let entry = ingest(state, path, data).await?;
    Ok(Json(StoredResponse {
        message: "Data stored successfully",
        entry,
    }))
}

pub async fn post_root(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StoredResponse>, ApiError> {
    store_entry(&state, "/", &body).await
}

pub async fn post_process(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StoredResponse>, ApiError> {
    store_entry(&state, "/process", &body).await
}

pub async fn post_any(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<Json<StoredResponse>, ApiError> {
    store_entry(&state, &path, &body).await
}

/// Catch-all ingest for POSTs to paths whose named route only answers GET.
pub async fn post_at_uri(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> Result<Json<StoredResponse>, ApiError> {
    store_entry(&state, uri.path(), &body).await
}

/// `POST /api/data`: answers 201 with the stored payload.
pub async fn post_api_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Payload>), ApiError> {
    let data = parse_body(&body)?;
    let stored = ingest(&state, "/api/data", data).await?;
    Ok((StatusCode::CREATED, Json(stored.data)))
}
