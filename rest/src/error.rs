use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use backfill::{BackfillError, StoreError};
use tracing::error;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(x) => (StatusCode::BAD_REQUEST, x),
            AppError::NotFound(x) => (StatusCode::NOT_FOUND, x),
            AppError::Conflict(x) => (StatusCode::CONFLICT, x),
            AppError::Unavailable(x) => {
                error!("{x}");
                (StatusCode::SERVICE_UNAVAILABLE, x)
            }
            AppError::Internal(err) => {
                error!("{err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
            }
        };

        return (status, Json(serde_json::json!({ "error": message }))).into_response();
    }
}

impl From<BackfillError> for AppError {
    fn from(err: BackfillError) -> Self {
        return match err {
            BackfillError::AlreadyRunning(_) => AppError::Conflict(err.to_string()),
            BackfillError::InvalidSettings(_) => AppError::BadRequest(err.to_string()),
            BackfillError::Store(StoreError::Unavailable(_)) => {
                AppError::Unavailable(err.to_string())
            }
            err => AppError::Internal(err.into()),
        };
    }
}

impl From<types::Error> for AppError {
    fn from(err: types::Error) -> Self {
        return AppError::BadRequest(err.to_string());
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        return AppError::Internal(err);
    }
}
