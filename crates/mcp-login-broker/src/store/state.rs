//! Pending-authorization storage keyed by one-time state tokens.

use std::sync::Arc;
use std::time::Duration;

use super::KvStore;
use crate::crypto;
use crate::error::StateError;
use crate::models::PendingAuthorization;

/// Namespace for pending authorizations in the shared store.
pub const STATE_KEY_PREFIX: &str = "oauth:state:";

/// Persists pending authorizations between `/authorize` and `/callback`.
#[derive(Clone)]
pub struct StateStore {
    kv: Arc<dyn KvStore>,
}

impl StateStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(state_token: &str) -> String {
        format!("{STATE_KEY_PREFIX}{state_token}")
    }

    /// Store `pending` under a new random state token, returning the token.
    pub async fn save(
        &self,
        pending: &PendingAuthorization,
        ttl: Duration,
    ) -> Result<String, StateError> {
        let state_token = crypto::random_token();
        let value = serde_json::to_string(pending).map_err(StateError::Corrupt)?;

        self.kv.put(&Self::key(&state_token), value, ttl).await?;

        tracing::debug!(
            client_id = %pending.client_id,
            ttl_secs = ttl.as_secs(),
            "Saved pending authorization"
        );
        Ok(state_token)
    }

    /// Read and delete the pending authorization for `state_token`.
    pub async fn consume(&self, state_token: &str) -> Result<PendingAuthorization, StateError> {
        let value = self
            .kv
            .take(&Self::key(state_token))
            .await?
            .ok_or(StateError::NotFound)?;

        serde_json::from_str(&value).map_err(|e| {
            tracing::warn!(error = %e, "Discarding corrupt pending authorization");
            StateError::Corrupt(e)
        })
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").finish()
    }
}
