use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::{RefreshError, StoreError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Carries the server's `message`, when it sent one.
    #[error("Unauthorized - token may be expired")]
    Unauthorized(Option<String>),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other non-success status.
    #[error("Status {status}: {detail}")]
    Status {
        status: StatusCode,
        message: Option<String>,
        detail: String,
    },

    /// The server answered with `success: false` or an error `message`.
    #[error("{0}")]
    Rejected(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the `message` field out of an error envelope, if the body is one.
    pub(crate) fn server_message(body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::server_message(body);
        let detail = message.clone().unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(detail),
            _ => ApiError::Status {
                status,
                message,
                detail,
            },
        }
    }

    /// Whether this error is the server rejecting our credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// Whether the server produced a response at all. Network failures,
    /// local request errors and store failures never reached the server.
    pub fn has_response(&self) -> bool {
        match self {
            ApiError::NetworkError(e) => e.status().is_some(),
            ApiError::InvalidRequest(_) | ApiError::Store(_) | ApiError::Refresh(_) => false,
            _ => true,
        }
    }
}
