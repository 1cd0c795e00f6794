//! Token storage for the authenticated client
//!
//! The store holds the access/refresh token pair issued at login. The pair is
//! only ever replaced as a whole (login, refresh, logout), so a reader always
//! sees either the old pair or the new one, never a mix of both.

use secrecy::{ExposeSecret, SecretString};
use std::sync::{PoisonError, RwLock};

/// Access token plus the optional refresh token issued alongside it
#[derive(Debug, Clone)]
pub struct TokenPair {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
}

impl TokenPair {
    /// Create a pair from raw token strings. A blank refresh token is
    /// stored as no refresh token.
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: refresh_token
                .filter(|token| !token.trim().is_empty())
                .map(SecretString::from),
        }
    }

    /// Create a pair from already-wrapped secrets
    pub fn from_secrets(access_token: SecretString, refresh_token: Option<SecretString>) -> Self {
        Self {
            access_token,
            refresh_token,
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    /// `Authorization` header value for this pair's access token
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }
}

/// Holder of the current token pair.
///
/// Implementations must replace both tokens in one step and must never block
/// for long: the client reads the store synchronously before every dispatch.
pub trait TokenStore: Send + Sync {
    /// Current pair, or `None` when logged out
    fn tokens(&self) -> Option<TokenPair>;

    /// Replace the current pair
    fn set_tokens(&self, pair: TokenPair);

    /// Drop the current pair
    fn logout(&self);
}

/// In-process token store. Tokens live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    pair: RwLock<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that starts out logged in
    pub fn with_tokens(pair: TokenPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn tokens(&self) -> Option<TokenPair> {
        self.pair
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_tokens(&self, pair: TokenPair) {
        *self.pair.write().unwrap_or_else(PoisonError::into_inner) = Some(pair);
    }

    fn logout(&self) {
        if self
            .pair
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            tracing::debug!("token pair cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_logged_out() {
        let store = MemoryTokenStore::new();
        assert!(store.tokens().is_none());
    }

    #[test]
    fn test_set_and_get() {
        let store = MemoryTokenStore::new();
        store.set_tokens(TokenPair::new("access-1", Some("refresh-1".to_string())));

        let pair = store.tokens().unwrap();
        assert_eq!(pair.access_token().expose_secret(), "access-1");
        assert_eq!(
            pair.refresh_token().map(|token| token.expose_secret()),
            Some("refresh-1")
        );
    }

    #[test]
    fn test_set_replaces_whole_pair() {
        let store =
            MemoryTokenStore::with_tokens(TokenPair::new("old", Some("old-refresh".to_string())));
        store.set_tokens(TokenPair::new("new", None));

        let pair = store.tokens().unwrap();
        assert_eq!(pair.access_token().expose_secret(), "new");
        assert!(pair.refresh_token().is_none());
    }

    #[test]
    fn test_logout_clears_pair() {
        let store = MemoryTokenStore::with_tokens(TokenPair::new("access", None));
        store.logout();
        assert!(store.tokens().is_none());

        // logging out twice is harmless
        store.logout();
        assert!(store.tokens().is_none());
    }

    #[test]
    fn test_blank_refresh_token_is_dropped() {
        assert!(TokenPair::new("access", Some(String::new())).refresh_token().is_none());
        assert!(TokenPair::new("access", Some("  ".to_string())).refresh_token().is_none());
        assert!(TokenPair::new("access", Some("r1".to_string())).refresh_token().is_some());
    }

    #[test]
    fn test_bearer_header_value() {
        let pair = TokenPair::new("abc123", None);
        assert_eq!(pair.bearer(), "Bearer abc123");
    }

    #[test]
    fn test_debug_output_redacts_tokens() {
        let pair = TokenPair::new("super-secret-access", Some("super-secret-refresh".to_string()));
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("super-secret-access"));
        assert!(!debug.contains("super-secret-refresh"));
    }
}
