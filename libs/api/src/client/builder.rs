use std::sync::Arc;
use tollgate_shared::{MemoryTokenStore, Notifier, TokenStore, TracingNotifier};

use super::{ApiClient, ClientInner};
use crate::attacher::AuthAttacher;
use crate::config::ClientConfig;
use crate::coordinator::RefreshCoordinator;
use crate::error::ApiError;
use crate::transport::{ReqwestTransport, Transport};

/// Builder for [`ApiClient`]
///
/// ```rust,no_run
/// use tollgate_api::{ApiClient, ClientConfig};
///
/// let client = ApiClient::builder(ClientConfig::new("https://admin.example.com/api"))
///     .build()?;
/// # Ok::<(), tollgate_api::ApiError>(())
/// ```
pub struct ApiClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn TokenStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            store: None,
            notifier: None,
            transport: None,
        }
    }

    /// Use an existing token store, e.g. one shared with other clients
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replace the network layer, mostly for tests
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier));

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                transport,
                attacher: AuthAttacher::new(store.clone()),
                store,
                notifier,
                coordinator: RefreshCoordinator::new(),
                refresh_timeout: self.config.refresh_timeout,
            }),
        })
    }
}
