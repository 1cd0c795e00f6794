//! Request dispatch
//!
//! [`Transport`] is the only place requests touch the network. It carries no
//! business rules: no auth, no retries, no status interpretation. Any HTTP
//! status comes back as an [`ApiResponse`]; only failures without a response
//! are errors.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tollgate_shared::{TlsClientConfig, create_tls_client};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::request::PreparedRequest;

/// Failure to obtain any HTTP response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("http request failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_connect() {
            TransportError::Connection(error.to_string())
        } else if error.is_builder() {
            TransportError::InvalidRequest(error.to_string())
        } else {
            TransportError::Http(error.to_string())
        }
    }
}

/// A fully buffered HTTP response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Response with a JSON body, mostly useful for stub transports
    pub fn json_body(status: StatusCode, body: &Value) -> Self {
        let mut response = Self::new(status, body.to_string());
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body. An empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let result = if self.body.is_empty() {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(&self.body)
        };
        result.map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Body as JSON, or `None` when it is empty or not JSON
    pub fn json_value(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends prepared requests and returns whatever the server answered
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<ApiResponse, TransportError>;
}

/// `reqwest`-backed transport with a fixed timeout and payload limit
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
    max_payload_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ApiError::InvalidRequest(format!("invalid user agent: {e}")))?,
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = create_tls_client(
            TlsClientConfig::default()
                .with_headers(headers)
                .with_timeout(config.request_timeout),
        )
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(Self::with_client(
            http,
            &config.base_url,
            config.max_payload_bytes,
        ))
    }

    /// Wrap an existing `reqwest` client
    pub fn with_client(http: reqwest::Client, base_url: &str, max_payload_bytes: usize) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_payload_bytes,
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn check_size(&self, size: usize) -> Result<(), TransportError> {
        if size > self.max_payload_bytes {
            return Err(TransportError::PayloadTooLarge {
                size,
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, prepared: PreparedRequest) -> Result<ApiResponse, TransportError> {
        let request = prepared.request;
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path))
            .headers(request.headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = &request.body {
            let payload = serde_json::to_vec(body)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            self.check_size(payload.len())?;
            builder = builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(payload);
        }

        let mut response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        if let Some(length) = response.content_length() {
            self.check_size(usize::try_from(length).unwrap_or(usize::MAX))?;
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            self.check_size(body.len() + chunk.len())?;
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(
            status = status.as_u16(),
            bytes = body.len(),
            "response received"
        );

        Ok(ApiResponse {
            status,
            headers,
            body: Bytes::from(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(limit: usize) -> ReqwestTransport {
        ReqwestTransport::with_client(reqwest::Client::new(), "http://localhost:9/api/", limit)
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let transport = transport(1024);
        assert_eq!(transport.url("/users"), "http://localhost:9/api/users");
        assert_eq!(transport.url("users"), "http://localhost:9/api/users");
    }

    #[test]
    fn test_payload_limit_is_inclusive() {
        let transport = transport(4);
        assert!(transport.check_size(4).is_ok());
        assert_eq!(
            transport.check_size(5),
            Err(TransportError::PayloadTooLarge { size: 5, limit: 4 })
        );
    }

    #[tokio::test]
    async fn test_oversized_request_body_is_rejected_before_sending() {
        let transport = transport(8);
        let request = crate::request::ApiRequest::post("/users")
            .with_json(json!({"name": "far too long for the limit"}));

        let result = transport
            .send(PreparedRequest::unauthenticated(request))
            .await;

        assert!(matches!(
            result,
            Err(TransportError::PayloadTooLarge { limit: 8, .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_transport_error() {
        // port 9 (discard) is closed on test machines
        let transport = transport(1024);
        let result = transport
            .send(PreparedRequest::unauthenticated(
                crate::request::ApiRequest::get("/users"),
            ))
            .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let response = ApiResponse::new(StatusCode::NO_CONTENT, Bytes::new());
        let value: Option<Value> = response.json().unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_invalid_json_is_a_decode_error() {
        let response = ApiResponse::new(StatusCode::OK, "not json");
        let result: Result<Value, ApiError> = response.json();
        assert!(matches!(result, Err(ApiError::Decode(_))));
        assert!(response.json_value().is_none());
        assert_eq!(response.text(), "not json");
    }
}
