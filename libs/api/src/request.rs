//! Request descriptors
//!
//! Callers build an [`ApiRequest`] once and keep it pristine. Every dispatch,
//! replays included, works from a fresh copy so headers stamped on one
//! attempt never leak into the next.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use uuid::Uuid;

/// Marks whether a request is being sent for the first time or replayed
/// after a token refresh. A replay never enters the refresh flow again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAttempt {
    First,
    Replay,
}

impl RequestAttempt {
    pub fn is_replay(self) -> bool {
        matches!(self, Self::Replay)
    }

    /// The attempt that follows this one
    pub fn next(self) -> Self {
        Self::Replay
    }
}

/// Transport-independent description of a call against the backend
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Correlates log lines for every attempt of this request
    pub id: Uuid,
    pub method: Method,
    /// Path relative to the configured base URL, e.g. `/users`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A request ready for the transport: headers are final and the attempt is
/// fixed for its lifetime.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub request: ApiRequest,
    pub attempt: RequestAttempt,
}

impl PreparedRequest {
    /// Wrap a request that must go out exactly as given, without any
    /// authentication applied.
    pub fn unauthenticated(request: ApiRequest) -> Self {
        Self {
            request,
            attempt: RequestAttempt::First,
        }
    }
}
