//! Authenticated HTTP client for the admin backend
//!
//! Every protected call carries the current bearer token. When the backend
//! answers 401 the client refreshes the session once, no matter how many calls
//! failed at the same time, and replays the failed calls in the order their
//! 401s arrived. If the refresh fails the session is cleared and the user is
//! told, once.

pub mod attacher;
pub mod classify;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod endpoints;
pub mod error;
pub mod request;
pub mod transport;

pub use attacher::AuthAttacher;
pub use classify::{ClassifiedError, classify};
pub use client::{ApiClient, ApiClientBuilder};
pub use config::{ClientConfig, ClientConfigOverrides};
pub use coordinator::{RefreshCoordinator, RefreshState};
pub use endpoints::is_public_endpoint;
pub use error::{ApiError, HttpFailure, RefreshError};
pub use request::{ApiRequest, RequestAttempt};
pub use transport::{ApiResponse, ReqwestTransport, Transport, TransportError};

pub use tollgate_shared::{
    ChannelNotifier, MemoryTokenStore, Notification, Notifier, TokenPair, TokenStore,
    TracingNotifier,
};
