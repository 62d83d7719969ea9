//! No-op store.

use async_trait::async_trait;
use idcloud_core::IdCloudResult;

use super::CacheStore;
use crate::entry::CacheEntry;

/// Store that keeps nothing. Every read misses and every write succeeds, so a
/// cache over it can never serve wrong data.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStore;

#[async_trait]
impl CacheStore for DisabledStore {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn get(&self, _key: &str) -> IdCloudResult<Option<CacheEntry>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _entry: CacheEntry) -> IdCloudResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> IdCloudResult<bool> {
        Ok(false)
    }

    async fn clear(&self) -> IdCloudResult<()> {
        Ok(())
    }

    async fn size(&self) -> IdCloudResult<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_disabled_store_keeps_nothing() {
        let store = DisabledStore;
        store.set("k", CacheEntry::new(json!(1))).await.expect("set");
        assert!(store.get("k").await.expect("get").is_none());
        assert!(!store.delete("k").await.expect("delete"));
        store.clear().await.expect("clear");
        assert_eq!(store.size().await.expect("size"), 0);
    }
}
