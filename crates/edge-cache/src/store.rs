//! Cache store adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use edge_core::Response;
use parking_lot::RwLock;

use crate::key::RequestKey;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// A single named cache namespace addressed by request identity.
///
/// There is no eviction and no transactional discipline: concurrent writers
/// to the same key are last-write-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Name of the namespace.
    fn name(&self) -> &str;

    /// Look up the stored response for a request.
    async fn match_request(&self, key: &RequestKey) -> CacheResult<Option<Response>>;

    /// Store or overwrite the response for a request.
    async fn put(&self, key: RequestKey, response: Response) -> CacheResult<()>;

    /// Store several responses at once. Either all entries are stored or none.
    async fn add_all(&self, entries: Vec<(RequestKey, Response)>) -> CacheResult<()>;
}

/// In-memory cache store.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    name: String,
    entries: RwLock<HashMap<RequestKey, Response>>,
}

impl InMemoryCacheStore {
    /// Open an empty namespace.
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the namespace is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &RequestKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Stored entry for `key`, without going through the async interface.
    pub fn get(&self, key: &RequestKey) -> Option<Response> {
        self.entries.read().get(key).cloned()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, key: &RequestKey) -> CacheResult<Option<Response>> {
        Ok(self.get(key))
    }

    async fn put(&self, key: RequestKey, response: Response) -> CacheResult<()> {
        self.entries.write().insert(key, response);
        Ok(())
    }

    async fn add_all(&self, entries: Vec<(RequestKey, Response)>) -> CacheResult<()> {
        self.entries.write().extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(s: &str) -> RequestKey {
        RequestKey::get(&Url::parse(s).unwrap())
    }

    #[tokio::test]
    async fn test_put_then_match() {
        let store = InMemoryCacheStore::open("test");
        store.put(key("https://host.test/a"), Response::text("a")).await.unwrap();

        let hit = store.match_request(&key("https://host.test/a")).await.unwrap();
        assert_eq!(hit.unwrap().body_text().unwrap(), "a");
        assert!(store.match_request(&key("https://host.test/b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryCacheStore::open("test");
        store.put(key("https://host.test/a"), Response::text("v1")).await.unwrap();
        store.put(key("https://host.test/a"), Response::text("v2")).await.unwrap();

        assert_eq!(store.len(), 1);
        let entry = store.get(&key("https://host.test/a")).unwrap();
        assert_eq!(entry.body_text().unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_add_all() {
        let store = InMemoryCacheStore::open("test");
        store
            .add_all(vec![
                (key("https://host.test/a"), Response::text("a")),
                (key("https://host.test/b"), Response::text("b")),
            ])
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.contains(&key("https://host.test/b")));
    }

    #[test]
    fn test_store_name() {
        let store = InMemoryCacheStore::open("edge-offline-v1");
        assert_eq!(store.name(), "edge-offline-v1");
        assert!(store.is_empty());
    }
}
