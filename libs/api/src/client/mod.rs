//! Authenticated API client
//!
//! [`ApiClient`] wires the pieces together for every call:
//! - [`AuthAttacher`] stamps a fresh copy of the request with the current token
//! - the [`Transport`] dispatches it
//! - a 401 on a protected, first-attempt request is handed to the
//!   [`RefreshCoordinator`], which makes sure concurrent failures share a
//!   single refresh call and are replayed in arrival order
//! - anything left over is classified and reported to the [`Notifier`]

mod builder;


pub use builder::ApiClientBuilder;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tollgate_shared::{Notification, Notifier, TokenPair, TokenStore};
use tracing::Instrument;

use crate::attacher::AuthAttacher;
use crate::config::ClientConfig;
use crate::coordinator::{Acquired, EpisodeLeader, RefreshCoordinator};
use crate::endpoints::{
    FORGOT_PASSWORD_PATH, LOGIN_PATH, REFRESH_TOKEN_PATH, is_login_endpoint, is_public_endpoint,
};
use crate::error::{ApiError, HttpFailure, RefreshError};
use crate::request::{ApiRequest, PreparedRequest, RequestAttempt};
use crate::transport::{ApiResponse, Transport};

/// Token payload returned by the login and refresh endpoints
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default, alias = "accessToken")]
    access_token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn parse(response: &ApiResponse) -> Result<Self, String> {
        let parsed: TokenResponse =
            serde_json::from_slice(&response.body).map_err(|e| e.to_string())?;

        if parsed.access_token.trim().is_empty() {
            return Err("response carries no access_token".to_string());
        }
        Ok(parsed)
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    attacher: AuthAttacher,
    coordinator: RefreshCoordinator,
    refresh_timeout: Duration,
}

/// Cheap to clone; clones share tokens, transport and refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Client with an in-memory token store, `tracing` notifications and the
    /// default `reqwest` transport.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.store.tokens().is_some()
    }

    /// Send `request` and return the successful response.
    ///
    /// An expired session is recovered transparently when possible. Errors
    /// other than [`ApiError::SessionExpired`] are reported to the notifier
    /// before being returned; session expiry is reported once per episode by
    /// the episode leader.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let span = tracing::debug_span!(
            "api_request",
            id = %request.id,
            method = %request.method,
            path = %request.path,
        );

        let result = self.run(&request).instrument(span).await;

        if let Err(error) = &result
            && !error.is_session_expired()
        {
            self.report(error);
        }
        result
    }

    async fn run(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut attempt = RequestAttempt::First;

        loop {
            let prepared = self.inner.attacher.attach(request, attempt)?;
            let response = self.inner.transport.send(prepared).await?;

            if response.is_success() {
                tracing::debug!(status = response.status.as_u16(), ?attempt, "request succeeded");
                return Ok(response);
            }

            if !qualifies_for_refresh(request, attempt, &response) {
                if response.status == StatusCode::UNAUTHORIZED {
                    if is_login_endpoint(&request.path) {
                        tracing::debug!("credentials rejected by login endpoint");
                    } else if attempt.is_replay() {
                        tracing::warn!("request still unauthorized after token refresh");
                    }
                }
                return Err(ApiError::from_failure(HttpFailure::from_response(
                    &response,
                )));
            }

            // marked before any refresh so a second 401 is terminal
            attempt = attempt.next();

            match self.inner.coordinator.acquire_or_enqueue() {
                Acquired::Leader(leader) => self.lead_episode(leader).await?,
                Acquired::Waiter(waiter) => {
                    tracing::debug!(
                        episode = waiter.episode(),
                        ticket = waiter.ticket(),
                        "waiting on token refresh"
                    );
                    waiter.wait().await?;
                }
            }
        }
    }

    /// Run the refresh call for the episode and resolve it for everyone queued
    async fn lead_episode(&self, leader: EpisodeLeader) -> Result<(), RefreshError> {
        let episode = leader.episode();
        tracing::info!(episode, "starting token refresh");

        match self.refresh_tokens().await {
            Ok(access_token) => {
                let released = leader.resolve(Ok(access_token));
                tracing::info!(episode, released, "session refreshed");
                // queued callers replay before the leader does
                tokio::task::yield_now().await;
                Ok(())
            }
            Err(error) => {
                // cleared before going idle so a late 401 cannot start a new
                // episode with the rejected tokens
                self.inner.store.logout();
                let released = leader.resolve(Err(error.clone()));
                tracing::warn!(episode, released, error = %error, "token refresh failed, session cleared");
                self.inner.notifier.notify(Notification::session_expired());
                Err(error)
            }
        }
    }

    /// Exchange the stored refresh token for a new pair. Goes straight to the
    /// transport so the refresh call is never intercepted itself.
    async fn refresh_tokens(&self) -> Result<SecretString, RefreshError> {
        let refresh_token = self
            .inner
            .store
            .tokens()
            .and_then(|pair| pair.refresh_token().cloned())
            .filter(|token| !token.expose_secret().trim().is_empty())
            .ok_or(RefreshError::MissingRefreshToken)?;

        let request = ApiRequest::post(REFRESH_TOKEN_PATH)
            .with_json(json!({ "refresh_token": refresh_token.expose_secret() }));

        let response = tokio::time::timeout(
            self.inner.refresh_timeout,
            self.inner
                .transport
                .send(PreparedRequest::unauthenticated(request)),
        )
        .await
        .map_err(|_| RefreshError::Timeout)??;

        if !response.is_success() {
            let failure = HttpFailure::from_response(&response);
            return Err(RefreshError::Rejected {
                status: failure.status.as_u16(),
                message: failure
                    .message()
                    .unwrap_or(failure.status_text())
                    .to_string(),
            });
        }

        let tokens = TokenResponse::parse(&response).map_err(RefreshError::InvalidResponse)?;
        let access_token = SecretString::from(tokens.access_token);
        let refresh_token = match tokens.refresh_token {
            Some(rotated) if !rotated.trim().is_empty() => SecretString::from(rotated),
            _ => refresh_token,
        };

        self.inner.store.set_tokens(TokenPair::from_secrets(
            access_token.clone(),
            Some(refresh_token),
        ));

        Ok(access_token)
    }

    fn report(&self, error: &ApiError) {
        let classified = error.classify();
        tracing::debug!(title = %classified.title, status = ?classified.status_code, "reporting failure");
        self.inner.notifier.notify(Notification::from(&classified));
    }

    /// Log in and store the issued token pair
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<(), ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).with_json(json!({
            "email": email,
            "password": password.expose_secret(),
        }));

        let response = self.execute(request).await?;
        let tokens = match TokenResponse::parse(&response) {
            Ok(tokens) => tokens,
            Err(error) => {
                let error = ApiError::Decode(error);
                self.report(&error);
                return Err(error);
            }
        };

        self.inner
            .store
            .set_tokens(TokenPair::new(tokens.access_token, tokens.refresh_token));
        tracing::info!("logged in");
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(FORGOT_PASSWORD_PATH).with_json(json!({ "email": email }));
        self.execute(request).await?;
        Ok(())
    }

    /// Drop the stored tokens. No call is made to the backend.
    pub fn logout(&self) {
        self.inner.store.logout();
        tracing::info!("logged out");
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::post(path).with_json(to_json(body)?);
        self.execute(request).await?.json()
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::put(path).with_json(to_json(body)?);
        self.execute(request).await?.json()
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::patch(path).with_json(to_json(body)?);
        self.execute(request).await?.json()
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::delete(path)).await?.json()
    }
}

/// 401 on a protected route that has not been replayed yet
fn qualifies_for_refresh(
    request: &ApiRequest,
    attempt: RequestAttempt,
    response: &ApiResponse,
) -> bool {
    response.status == StatusCode::UNAUTHORIZED
        && !is_public_endpoint(&request.path)
        && !attempt.is_replay()
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}
