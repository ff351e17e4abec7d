use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failure of a single fetch-and-reconcile job. Recovered at the job boundary.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status} from {path}")]
    HttpStatus { status: u16, path: String },

    #[error("empty response body from {path}")]
    EmptyBody { path: String },

    #[error("malformed payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] sea_orm::DbErr),
}

impl SyncError {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Network(_) | SyncError::Timeout(_) => "network",
            SyncError::HttpStatus { .. } | SyncError::EmptyBody { .. } => "fetch_failed",
            SyncError::Parse(_) => "parse",
            SyncError::Store(_) => "store",
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    source: anyhow::Error,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, source: anyhow::anyhow!(message.into()) }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.source.fmt(f)
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, source: err }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::from(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = %self.source, "request failed");
        }
        let body = serde_json::json!({ "error": self.source.to_string() });
        (self.status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
