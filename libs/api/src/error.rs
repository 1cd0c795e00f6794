use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;

use crate::classify::{ClassifiedError, classify, session_expired};
use crate::transport::{ApiResponse, TransportError};

/// A non-success HTTP response
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub status: StatusCode,
    /// Parsed JSON body, `Value::Null` when the body is empty or not JSON
    pub body: Value,
}

impl HttpFailure {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn from_response(response: &ApiResponse) -> Self {
        Self::new(
            response.status,
            response.json_value().unwrap_or(Value::Null),
        )
    }

    /// Reason phrase for the status, `"Unknown"` for non-standard codes
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown")
    }

    /// The body's `message` field, when present and non-empty
    pub fn message(&self) -> Option<&str> {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{} {}: {}", self.status.as_u16(), self.status_text(), message),
            None => write!(f, "{} {}", self.status.as_u16(), self.status_text()),
        }
    }
}

/// Why a token refresh episode failed. Shared by every caller queued on the
/// episode, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("refresh call timed out")]
    Timeout,

    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh call failed: {0}")]
    Network(String),

    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("refresh episode abandoned before completion")]
    Abandoned,
}

impl From<TransportError> for RefreshError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => RefreshError::Timeout,
            other => RefreshError::Network(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was received
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// 4xx response, including a 401 that could not be recovered
    #[error("request failed: {0}")]
    Client(HttpFailure),

    /// 5xx response
    #[error("server error: {0}")]
    Server(HttpFailure),

    /// The session could not be refreshed; tokens have been cleared
    #[error("session expired: {0}")]
    SessionExpired(#[from] RefreshError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a non-success response to `Client` or `Server`
    pub fn from_failure(failure: HttpFailure) -> Self {
        if failure.status.is_server_error() {
            ApiError::Server(failure)
        } else {
            ApiError::Client(failure)
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Client(failure) | ApiError::Server(failure) => Some(failure.status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }

    /// Presentable form of this error
    pub fn classify(&self) -> ClassifiedError {
        match self {
            ApiError::Network(TransportError::PayloadTooLarge { .. }) => ClassifiedError {
                title: "Payload Too Large".to_string(),
                description: self.to_string(),
                status_code: None,
                retryable: false,
            },
            ApiError::Network(TransportError::InvalidRequest(message))
            | ApiError::InvalidRequest(message) => ClassifiedError {
                title: "Invalid Request".to_string(),
                description: message.clone(),
                status_code: None,
                retryable: false,
            },
            ApiError::Network(_) => classify(None),
            ApiError::Client(failure) | ApiError::Server(failure) => classify(Some(failure)),
            ApiError::SessionExpired(_) => session_expired(),
            ApiError::Decode(message) => ClassifiedError {
                title: "Invalid Response".to_string(),
                description: message.clone(),
                status_code: None,
                retryable: false,
            },
        }
    }
}
