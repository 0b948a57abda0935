use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Token refresh failed for user {user_id}: {reason}")]
    Refresh { user_id: String, reason: String },

    #[error("Ingestion failed: {0}")]
    Ingest(#[source] Box<AppError>),

    #[error("Aggregation failed: {0}")]
    Aggregation(#[source] Box<AppError>),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stable classification of a failure, recorded in batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Refresh,
    Ingest,
    Aggregation,
    Delivery,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotFound => "not_found",
            Self::Refresh => "refresh",
            Self::Ingest => "ingest",
            Self::Aggregation => "aggregation",
            Self::Delivery => "delivery",
            Self::Internal => "internal",
        }
    }
}

impl AppError {
    pub fn ingest(source: AppError) -> Self {
        match source {
            // Already classified errors keep their kind
            e @ (Self::NotFound(_) | Self::Refresh { .. } | Self::Ingest(_)) => e,
            other => Self::Ingest(Box::new(other)),
        }
    }

    pub fn aggregation(source: AppError) -> Self {
        match source {
            e @ (Self::NotFound(_) | Self::Aggregation(_)) => e,
            other => Self::Aggregation(Box::new(other)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Refresh { .. } => ErrorKind::Refresh,
            Self::Ingest(_) => ErrorKind::Ingest,
            Self::Aggregation(_) => ErrorKind::Aggregation,
            Self::Delivery(_) => ErrorKind::Delivery,
            _ => ErrorKind::Internal,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Self::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            Self::HttpRequest(ref e) => {
                tracing::error!("HTTP request error: {}", e);
                (StatusCode::BAD_GATEWAY, "External service request failed")
            }
            Self::Serialization(ref e) => {
                tracing::error!("Serialization error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Data processing error")
            }
            Self::Io(ref e) => {
                tracing::error!("I/O error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error occurred")
            }
            Self::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            Self::Refresh { .. } => (StatusCode::UNAUTHORIZED, "Token refresh failed"),
            Self::Ingest(ref e) => {
                tracing::error!("Ingestion error: {}", e);
                (StatusCode::BAD_GATEWAY, "Ingestion failed")
            }
            Self::Aggregation(ref e) => {
                tracing::error!("Aggregation error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Aggregation failed")
            }
            Self::Delivery(ref msg) => (StatusCode::BAD_GATEWAY, msg.as_str()),
            Self::ExternalApi(ref msg) => (StatusCode::BAD_GATEWAY, msg.as_str()),
            Self::Configuration(ref msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str()),
            Self::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str())
            }
            Self::Other(ref e) => {
                tracing::error!("Unexpected error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
