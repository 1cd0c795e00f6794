//! Turns raw call failures into something a user can read
//!
//! Classification is deterministic: the same failure always yields the same
//! [`ClassifiedError`].

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tollgate_shared::{Notification, SESSION_EXPIRED_TITLE};

use crate::error::HttpFailure;

pub const NETWORK_ERROR_TITLE: &str = "Network Error";
pub const NETWORK_ERROR_DESCRIPTION: &str =
    "Unable to reach the server, please check your connection.";
pub const FALLBACK_DESCRIPTION: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub title: String,
    pub description: String,
    pub status_code: Option<u16>,
    /// Whether retrying the same call later may succeed
    pub retryable: bool,
}

impl From<&ClassifiedError> for Notification {
    fn from(error: &ClassifiedError) -> Self {
        Notification::new(error.title.clone(), error.description.clone(), true)
    }
}

/// Classify a failed call. `None` means no response was received.
pub fn classify(response: Option<&HttpFailure>) -> ClassifiedError {
    let Some(failure) = response else {
        return ClassifiedError {
            title: NETWORK_ERROR_TITLE.to_string(),
            description: NETWORK_ERROR_DESCRIPTION.to_string(),
            status_code: None,
            retryable: true,
        };
    };

    ClassifiedError {
        title: status_title(failure),
        description: describe(&failure.body),
        status_code: Some(failure.status.as_u16()),
        retryable: is_retryable(failure.status),
    }
}

pub(crate) fn session_expired() -> ClassifiedError {
    ClassifiedError {
        title: SESSION_EXPIRED_TITLE.to_string(),
        description: "Your session has expired. Please log in again.".to_string(),
        status_code: None,
        retryable: false,
    }
}

fn status_title(failure: &HttpFailure) -> String {
    let title = match failure.status.as_u16() {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        status => return format!("{} - {}", status, failure.status_text()),
    };
    title.to_string()
}

/// Field errors first, then the body message, then a generic fallback
fn describe(body: &Value) -> String {
    let field_errors: Vec<String> = body
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|error| {
                    let field = error.get("field")?.as_str()?;
                    let message = error.get("message")?.as_str()?;
                    Some(format!("{field}: {message}"))
                })
                .collect()
        })
        .unwrap_or_default();

    if !field_errors.is_empty() {
        return field_errors.join(", ");
    }

    body.get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string())
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}
