//! Error types for the upload tracker

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Upload tracker errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Pipeline backend answered with a non-success status
    #[error("Pipeline backend returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },

    /// Pipeline status body could not be understood
    #[error("Malformed pipeline status for '{document_id}': {message}")]
    MalformedResponse {
        document_id: String,
        message: String,
    },

    /// Request body was understood but is not acceptable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Document is not tracked
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Tracker task is gone
    #[error("Tracker channel closed")]
    ChannelClosed,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a backend error
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(document_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            document_id: document_id.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::BAD_REQUEST, "config_error", msg.clone()),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Toml(err) => (StatusCode::BAD_REQUEST, "toml_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Backend { .. } => (StatusCode::BAD_GATEWAY, "backend_error", self.to_string()),
            Error::MalformedResponse { .. } => {
                (StatusCode::BAD_GATEWAY, "malformed_response", self.to_string())
            }
            Error::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            Error::DocumentNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Document not found: {}", id),
            ),
            Error::ChannelClosed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "tracker_unavailable",
                self.to_string(),
            ),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::http::parse_status_body;

    #[test]
    fn test_decode_failures_surface_as_bad_gateway() {
        let err = parse_status_body("D1", r#"{"pipeline_progress":{}}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_response_status_by_kind() {
        let cases = [
            (Error::config("bad"), StatusCode::BAD_REQUEST),
            (Error::DocumentNotFound("D9".into()), StatusCode::NOT_FOUND),
            (Error::ChannelClosed, StatusCode::SERVICE_UNAVAILABLE),
            (Error::backend(503, "down"), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
