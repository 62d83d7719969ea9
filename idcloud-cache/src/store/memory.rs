//! In-process store.

use async_trait::async_trait;
use dashmap::DashMap;
use idcloud_core::IdCloudResult;

use super::CacheStore;
use crate::entry::CacheEntry;

/// Concurrent in-memory key/value table. Entries leave only through
/// `delete` or `clear`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> IdCloudResult<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> IdCloudResult<()> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> IdCloudResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn clear(&self) -> IdCloudResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn size(&self) -> IdCloudResult<usize> {
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.expect("get").is_none());

        let entry = CacheEntry::new(json!({"href": "/k"}));
        store.set("k", entry.clone()).await.expect("set");
        assert_eq!(store.get("k").await.expect("get"), Some(entry));
        assert_eq!(store.size().await.expect("size"), 1);

        assert!(store.delete("k").await.expect("delete"));
        assert!(!store.delete("k").await.expect("delete"));
        assert_eq!(store.size().await.expect("size"), 0);
    }

    #[tokio::test]
    async fn test_overwrite_and_clear() {
        let store = MemoryStore::new();
        store.set("a", CacheEntry::new(json!(1))).await.expect("set");
        store.set("a", CacheEntry::new(json!(2))).await.expect("set");
        store.set("b", CacheEntry::new(json!(3))).await.expect("set");

        let a = store.get("a").await.expect("get").expect("present");
        assert_eq!(a.value(), &json!(2));
        assert_eq!(store.size().await.expect("size"), 2);

        store.clear().await.expect("clear");
        assert_eq!(store.size().await.expect("size"), 0);
    }
}
