//! TTL key-value storage.
//!
//! [`KvStore`] is the contract the broker needs from durable storage; the
//! one-time semantics of pending authorizations rest on [`KvStore::take`]
//! being atomic. [`MemoryKvStore`] is a moka-backed implementation with
//! per-entry expiry.

pub mod state;

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;

use crate::error::StoreError;

pub use state::StateStore;

/// Maximum number of live entries in the in-memory store.
const MAX_ENTRIES: u64 = 100_000;

/// Key-value store with per-entry expiry.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Write `value` under `key`, expiring after `ttl`.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove a value if present.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically read and remove a live value.
    ///
    /// Of any number of concurrent calls for the same key, at most one
    /// returns `Some`.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;
}

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory [`KvStore`].
#[derive(Clone)]
pub struct MemoryKvStore {
    entries: Cache<String, Entry>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        let entries = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .expire_after(EntryExpiry)
            .build();
        Self { entries }
    }

    /// Number of entries not yet evicted (may include expired ones).
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKvStore")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryKvStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let entry = Entry {
            value,
            ttl,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entry = self.entries.get(key).await;
        Ok(entry.filter(Entry::is_live).map(|e| e.value))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entry = self.entries.remove(key).await;
        Ok(entry.filter(Entry::is_live).map(|e| e.value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryKvStore::new();
        store.put("k", "v".into(), TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_take_is_one_time() {
        let store = MemoryKvStore::new();
        store.put("k", "v".into(), TTL).await.unwrap();

        assert_eq!(store.take("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.take("k").await.unwrap().is_none());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible() {
        let store = MemoryKvStore::new();
        store
            .put("k", "v".into(), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.take("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_take_single_winner() {
        let store = Arc::new(MemoryKvStore::new());
        store.put("k", "v".into(), TTL).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.take("k").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
