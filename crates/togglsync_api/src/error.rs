//! Error model shared by all collaborator API clients.

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Represents the failure modes of a collaborator call: HTTP errors with
/// status and server message, authentication failures, timeouts, network
/// issues, serialization problems and other unexpected errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http {status}: {message}")]
    Http {
        status: StatusCode,
        message: String,
    },
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl ApiError {
    /// Constructs an HTTP error variant from a status and server body.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Http {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    /// Converts reqwest errors into semantic ApiError variants.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_status() {
            let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            ApiError::Http {
                status,
                message: err.to_string(),
            }
        } else if err.is_connect() {
            ApiError::Network(err.to_string())
        } else {
            ApiError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    /// Converts serde_json decode/encode failures into serialization errors.
    fn from(err: serde_json::Error) -> Self {
        ApiError::Serialization(err.to_string())
    }
}
