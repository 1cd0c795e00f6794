//! Bearer token attachment

use reqwest::header::{AUTHORIZATION, HeaderValue};
use std::sync::Arc;
use tollgate_shared::TokenStore;

use crate::endpoints::is_public_endpoint;
use crate::error::ApiError;
use crate::request::{ApiRequest, PreparedRequest, RequestAttempt};

/// Stamps outgoing requests with the current access token.
///
/// Runs synchronously right before dispatch and never suspends.
#[derive(Clone)]
pub struct AuthAttacher {
    store: Arc<dyn TokenStore>,
}

impl AuthAttacher {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Prepare a fresh copy of `request` for dispatch.
    ///
    /// Any caller-supplied `Authorization` header is dropped. Protected routes
    /// get `Bearer <access_token>` when the store holds tokens; public routes
    /// never get a header.
    pub fn attach(
        &self,
        request: &ApiRequest,
        attempt: RequestAttempt,
    ) -> Result<PreparedRequest, ApiError> {
        let mut request = request.clone();
        request.headers.remove(AUTHORIZATION);

        if !is_public_endpoint(&request.path)
            && let Some(pair) = self.store.tokens()
        {
            let mut value = HeaderValue::from_str(&pair.bearer()).map_err(|_| {
                ApiError::InvalidRequest("access token is not a valid header value".to_string())
            })?;
            value.set_sensitive(true);
            request.headers.insert(AUTHORIZATION, value);
        }

        Ok(PreparedRequest { request, attempt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_shared::{MemoryTokenStore, TokenPair};

    fn logged_in(access: &str) -> AuthAttacher {
        AuthAttacher::new(Arc::new(MemoryTokenStore::with_tokens(TokenPair::new(
            access,
            Some("refresh".to_string()),
        ))))
    }

    #[test]
    fn test_protected_route_gets_bearer_header() {
        let prepared = logged_in("tok1")
            .attach(&ApiRequest::get("/users"), RequestAttempt::First)
            .unwrap();

        let header = prepared.request.headers.get(AUTHORIZATION).unwrap();
        assert_eq!(header, "Bearer tok1");
        assert!(header.is_sensitive());
        assert_eq!(prepared.attempt, RequestAttempt::First);
    }

    #[test]
    fn test_public_route_never_gets_header() {
        let prepared = logged_in("tok1")
            .attach(&ApiRequest::post("/auth/login"), RequestAttempt::First)
            .unwrap();

        assert!(prepared.request.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_logged_out_store_sends_no_header() {
        let attacher = AuthAttacher::new(Arc::new(MemoryTokenStore::new()));
        let prepared = attacher
            .attach(&ApiRequest::get("/users"), RequestAttempt::First)
            .unwrap();

        assert!(prepared.request.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_stale_header_is_replaced_and_original_untouched() {
        let original = ApiRequest::get("/users")
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));

        let prepared = logged_in("fresh")
            .attach(&original, RequestAttempt::Replay)
            .unwrap();

        assert_eq!(
            prepared.request.headers.get(AUTHORIZATION).unwrap(),
            "Bearer fresh"
        );
        assert_eq!(prepared.request.headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(
            original.headers.get(AUTHORIZATION).unwrap(),
            "Bearer stale"
        );
        assert_eq!(prepared.request.id, original.id);
    }

    #[test]
    fn test_caller_header_is_stripped_on_public_route() {
        let original = ApiRequest::post("/auth/login")
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer leaked"));

        let prepared = logged_in("tok1")
            .attach(&original, RequestAttempt::First)
            .unwrap();

        assert!(prepared.request.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_invalid_token_characters_are_rejected() {
        let attacher = logged_in("bad\ntoken");
        let result = attacher.attach(&ApiRequest::get("/users"), RequestAttempt::First);
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }
}
