//! Platform-verified TLS HTTP clients.
//!
//! Uses `rustls` with the OS-provided CA certificate store via
//! `rustls-platform-verifier`, so corporate proxies and private PKI work the
//! same way they do for the rest of the system.

use reqwest::{Client, header::HeaderMap};
use rustls_platform_verifier::BuilderVerifierExt;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TlsClientError {
    #[error("failed to build TLS config: {0}")]
    Tls(String),

    #[error("failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Options applied to every request made by the built client
#[derive(Debug, Clone, Default)]
pub struct TlsClientConfig {
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
}

impl TlsClientConfig {
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub fn create_tls_client(config: TlsClientConfig) -> Result<Client, TlsClientError> {
    // needed to use OS-provided CA certificates with Rustls
    let arc_crypto_provider = std::sync::Arc::new(rustls::crypto::ring::default_provider());
    let tls_config = rustls::ClientConfig::builder_with_provider(arc_crypto_provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsClientError::Tls(e.to_string()))?
        .with_platform_verifier()
        .with_no_client_auth();

    let mut builder = Client::builder()
        .use_preconfigured_tls(tls_config)
        .default_headers(config.headers);

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}
