use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use telesink_core::TelesinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body must be a JSON object")]
    BadBody,

    #[error("no data yet")]
    NoData,

    #[error("Endpoint not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] TelesinkError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadBody => StatusCode::BAD_REQUEST,
            ApiError::NoData | ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "internal server error"})),
                )
                    .into_response();
            }
        };

        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
