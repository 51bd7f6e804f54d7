use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use telesink_store::export::{to_csv, to_json};

use crate::error::ApiError;
use crate::state::AppState;

fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> impl IntoResponse {
    (
        [
            (CONTENT_TYPE, content_type.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
}

pub async fn download_json(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let records = state.store.export_rows().await?;
    tracing::debug!(count = records.len(), "json export");
    Ok(attachment("application/json", "telemetry.json", to_json(&records)?))
}

pub async fn download_csv(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let records = state.store.export_rows().await?;
    tracing::debug!(count = records.len(), "csv export");
    Ok(attachment("text/csv; charset=utf-8", "telemetry.csv", to_csv(&records)?))
}
