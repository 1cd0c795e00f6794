//! Collaborators shared by the tollgate client and CLI
//!
//! - `tokens`: the token store holding the current access/refresh pair
//! - `notify`: user-facing notifications for failed calls
//! - `tls_client`: platform-verified TLS `reqwest` clients

pub mod notify;
pub mod tls_client;
pub mod tokens;

pub use notify::{
    ChannelNotifier, Notification, Notifier, SESSION_EXPIRED_TITLE, TracingNotifier,
};
pub use tls_client::{TlsClientConfig, TlsClientError, create_tls_client};
pub use tokens::{MemoryTokenStore, TokenPair, TokenStore};
