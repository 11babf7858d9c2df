//! OAuth client registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::ClientInfo;

/// Looks up registered OAuth clients.
#[async_trait::async_trait]
pub trait ClientRegistry: Send + Sync {
    async fn lookup(&self, client_id: &str) -> Option<ClientInfo>;
}

/// In-memory [`ClientRegistry`].
#[derive(Clone, Default)]
pub struct InMemoryClientRegistry {
    clients: Arc<RwLock<HashMap<String, ClientInfo>>>,
}

impl InMemoryClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `clients`.
    #[must_use]
    pub fn with_clients(clients: impl IntoIterator<Item = ClientInfo>) -> Self {
        let clients = clients
            .into_iter()
            .map(|c| (c.client_id.clone(), c))
            .collect();
        Self {
            clients: Arc::new(RwLock::new(clients)),
        }
    }

    /// Register a new client under a generated id.
    pub async fn register(
        &self,
        client_name: Option<String>,
        redirect_uris: Vec<String>,
    ) -> ClientInfo {
        let client = ClientInfo {
            client_id: uuid::Uuid::new_v4().simple().to_string(),
            client_name,
            client_uri: None,
            logo_uri: None,
            redirect_uris,
        };

        self.insert(client.clone()).await;
        tracing::info!(client_id = %client.client_id, "Registered OAuth client");
        client
    }

    /// Insert or replace a client record.
    pub async fn insert(&self, client: ClientInfo) {
        self.clients
            .write()
            .await
            .insert(client.client_id.clone(), client);
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ClientRegistry for InMemoryClientRegistry {
    async fn lookup(&self, client_id: &str) -> Option<ClientInfo> {
        self.clients.read().await.get(client_id).cloned()
    }
}

impl std::fmt::Debug for InMemoryClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryClientRegistry").finish()
    }
}
