use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use telesink_core::model::{Payload, TelemetryRecord};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn service_status() -> Json<serde_json::Value> {
    Json(json!({"message": "Service is running", "status": "ok"}))
}

pub async fn health(State(state): State<AppState>) -> Response {
    let storage = state.store.kind().as_str();
    match state.store.count().await {
        Ok(records) => Json(json!({
            "status": "ok",
            "storage": storage,
            "records": records,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(storage, error = %e, "health check could not reach storage");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "degraded", "storage": storage})),
            )
                .into_response()
        }
    }
}

/// Data map of the most recent record.
pub async fn latest(State(state): State<AppState>) -> Result<Json<Payload>, ApiError> {
    match state.store.latest().await? {
        Some(record) => Ok(Json(record.data)),
        None => Err(ApiError::NoData),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

impl HistoryParams {
    fn effective_limit(&self, cap: usize) -> usize {
        self.limit.map_or(cap, |limit| limit.min(cap))
    }
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<TelemetryRecord>>, ApiError> {
    let limit = params.effective_limit(state.settings.history_limit);
    Ok(Json(state.store.history(limit).await?))
}
