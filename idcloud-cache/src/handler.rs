//! Href routing and payload decomposition.
//!
//! A single API response may embed expanded resources several levels deep.
//! Before caching, the payload is flattened: every nested object that carries
//! an `href` and at least one other field is cached under its own href and
//! replaced in its parent by a `{href}` stub. Collection pages are never
//! cached as a unit; only their items are.

use futures_util::future::try_join_all;
use idcloud_core::{href_of, is_collection_data, is_expanded_reference, reference_stub, CacheConfig, IdCloudResult};
use serde_json::{Map, Value};

use crate::cache::Cache;
use crate::manager::CacheManager;
use crate::region::Region;

/// Routes hrefs to region caches and decomposes payloads on write.
#[derive(Debug)]
pub struct CacheHandler {
    manager: CacheManager,
    /// Target for hrefs with no region or with a region the manager lacks.
    disabled: Cache,
}

impl CacheHandler {
    pub fn new(manager: CacheManager) -> Self {
        Self {
            manager,
            disabled: Cache::disabled(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> IdCloudResult<Self> {
        Ok(Self::new(CacheManager::from_config(config)?))
    }

    pub fn manager(&self) -> &CacheManager {
        &self.manager
    }

    /// The cache responsible for `href`.
    ///
    /// Falls back to a disabled cache when the href is absent, has no known
    /// region, or the region has no cache.
    pub fn cache_for(&self, href: Option<&str>) -> &Cache {
        href.and_then(Region::for_href)
            .and_then(|region| self.manager.get_cache(region))
            .unwrap_or(&self.disabled)
    }

    /// Cached value for `href`.
    pub async fn get(&self, href: &str) -> IdCloudResult<Option<Value>> {
        self.cache_for(Some(href)).get(href).await
    }

    /// Cached value for `href` with `fields` rebuilt from their own entries.
    ///
    /// A field holding a `{href}` stub is replaced by the cached resource it
    /// points to. If any such resource is not cached the whole read is a miss.
    pub async fn get_expanded(&self, href: &str, fields: &[&str]) -> IdCloudResult<Option<Value>> {
        let Some(mut parent) = self.get(href).await? else {
            return Ok(None);
        };
        for field in fields {
            let Some(child_href) = parent
                .get(*field)
                .filter(|value| value.as_object().is_some_and(|obj| obj.len() == 1))
                .and_then(href_of)
                .map(str::to_string)
            else {
                continue;
            };
            match self.get(&child_href).await? {
                Some(child) => {
                    if let Some(obj) = parent.as_object_mut() {
                        obj.insert((*field).to_string(), child);
                    }
                }
                None => return Ok(None),
            }
        }
        Ok(Some(parent))
    }

    /// Decompose `data` and store every resource in it under its own href.
    ///
    /// The puts run concurrently; the first failure is returned once the
    /// join completes or short-circuits.
    pub async fn put(&self, href: &str, data: &Value, is_new: bool) -> IdCloudResult<()> {
        let resources = build_cacheable_resources(data);
        tracing::trace!(href, count = resources.len(), "Caching decomposed resources");
        try_join_all(resources.into_iter().filter_map(|resource| {
            let key = resource.get("href").and_then(Value::as_str)?.to_string();
            let cache = self.cache_for(Some(&key));
            Some(async move { cache.put(&key, Value::Object(resource), is_new).await })
        }))
        .await?;
        Ok(())
    }

    /// Remove exactly `href`. Nested resources are left alone.
    pub async fn remove(&self, href: &str) -> IdCloudResult<()> {
        self.cache_for(Some(href)).delete(href).await
    }
}

/// Flatten a payload into independently cacheable resources.
///
/// Children come before the parent that referenced them. Objects without an
/// `href` are walked but not returned.
pub fn build_cacheable_resources(parent: &Value) -> Vec<Map<String, Value>> {
    let mut out = Vec::new();
    collect_resources(parent, &mut out);
    out
}

fn collect_resources(value: &Value, out: &mut Vec<Map<String, Value>>) {
    if is_collection_data(value) {
        if let Some(items) = value.get("items").and_then(Value::as_array) {
            for item in items {
                collect_resources(item, out);
            }
        }
        return;
    }

    let Some(obj) = value.as_object() else {
        return;
    };

    let mut flattened = Map::with_capacity(obj.len());
    for (key, field) in obj {
        if is_expanded_reference(field) {
            collect_resources(field, out);
            let href = href_of(field).unwrap_or_default();
            flattened.insert(key.clone(), reference_stub(href));
        } else {
            flattened.insert(key.clone(), field.clone());
        }
    }

    if flattened.get("href").is_some_and(Value::is_string) {
        out.push(flattened);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idcloud_core::StoreKind;
    use serde_json::json;

    fn handler() -> CacheHandler {
        CacheHandler::from_config(&CacheConfig::default()).expect("handler")
    }

    fn as_values(resources: Vec<Map<String, Value>>) -> Vec<Value> {
        resources.into_iter().map(Value::Object).collect()
    }

    #[test]
    fn test_nested_child_extracted() {
        let data = json!({"href": "/a", "child": {"href": "/b", "x": 1, "y": 2}});
        let resources = as_values(build_cacheable_resources(&data));
        assert_eq!(
            resources,
            vec![
                json!({"href": "/b", "x": 1, "y": 2}),
                json!({"href": "/a", "child": {"href": "/b"}}),
            ]
        );
    }

    #[test]
    fn test_stub_child_left_inline() {
        let data = json!({"href": "/a", "child": {"href": "/b"}, "name": "n"});
        let resources = as_values(build_cacheable_resources(&data));
        assert_eq!(resources, vec![data]);
    }

    #[test]
    fn test_deep_nesting() {
        let data = json!({
            "href": "/accounts/1",
            "directory": {
                "href": "/directories/2",
                "name": "dir",
                "tenant": {"href": "/tenants/3", "name": "t"}
            }
        });
        let resources = as_values(build_cacheable_resources(&data));
        assert_eq!(
            resources,
            vec![
                json!({"href": "/tenants/3", "name": "t"}),
                json!({"href": "/directories/2", "name": "dir", "tenant": {"href": "/tenants/3"}}),
                json!({"href": "/accounts/1", "directory": {"href": "/directories/2"}}),
            ]
        );
    }

    #[test]
    fn test_collection_items_cached_individually() {
        let data = json!({
            "href": "/applications/1/accounts",
            "offset": 0,
            "limit": 25,
            "items": [
                {"href": "/accounts/1", "email": "a@b.com"},
                {"href": "/accounts/2", "email": "c@d.com", "directory": {"href": "/directories/9", "name": "d"}}
            ]
        });
        let resources = as_values(build_cacheable_resources(&data));
        assert_eq!(resources.len(), 3);
        assert!(resources.iter().all(|r| r["href"] != json!("/applications/1/accounts")));
        assert!(resources.contains(&json!({"href": "/directories/9", "name": "d"})));
    }

    #[test]
    fn test_nested_collection_replaced_by_stub() {
        let data = json!({
            "href": "/groups/1",
            "accounts": {
                "href": "/groups/1/accounts",
                "offset": 0,
                "limit": 25,
                "items": [{"href": "/accounts/7", "email": "x@y.z"}]
            }
        });
        let resources = as_values(build_cacheable_resources(&data));
        assert_eq!(
            resources,
            vec![
                json!({"href": "/accounts/7", "email": "x@y.z"}),
                json!({"href": "/groups/1", "accounts": {"href": "/groups/1/accounts"}}),
            ]
        );
    }

    #[test]
    fn test_object_without_href_not_cached() {
        let data = json!({"account": {"href": "/accounts/1", "email": "a@b.com"}, "status": "ok"});
        let resources = as_values(build_cacheable_resources(&data));
        assert_eq!(resources, vec![json!({"href": "/accounts/1", "email": "a@b.com"})]);
        assert!(build_cacheable_resources(&json!("scalar")).is_empty());
    }

    #[tokio::test]
    async fn test_put_files_each_resource_in_its_region() {
        let handler = handler();
        let data = json!({
            "href": "https://api.example/v1/accounts/1",
            "email": "a@b.com",
            "directory": {"href": "https://api.example/v1/directories/2", "name": "dir"},
            "customData": {"href": "https://api.example/v1/accounts/1/customData", "color": "red"}
        });
        handler
            .put("https://api.example/v1/accounts/1", &data, true)
            .await
            .expect("put");

        let stats = handler.manager().stats();
        assert_eq!(stats[&Region::Accounts].puts, 1);
        assert_eq!(stats[&Region::Directories].puts, 1);
        assert_eq!(stats[&Region::CustomData].puts, 1);

        let account = handler
            .get("https://api.example/v1/accounts/1")
            .await
            .expect("get")
            .expect("cached");
        assert_eq!(
            account["directory"],
            json!({"href": "https://api.example/v1/directories/2"})
        );
    }

    #[tokio::test]
    async fn test_get_expanded_recomposes_children() {
        let handler = handler();
        let data = json!({
            "href": "/accounts/1",
            "directory": {"href": "/directories/2", "name": "dir"}
        });
        handler.put("/accounts/1", &data, true).await.expect("put");

        let expanded = handler
            .get_expanded("/accounts/1", &["directory", "missingField"])
            .await
            .expect("get")
            .expect("cached");
        assert_eq!(expanded, data);

        handler.remove("/directories/2").await.expect("remove");
        assert_eq!(
            handler.get_expanded("/accounts/1", &["directory"]).await.expect("get"),
            None
        );
        assert!(handler.get("/accounts/1").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn test_unroutable_hrefs_use_disabled_cache() {
        let handler = handler();
        assert_eq!(handler.cache_for(None).store_name(), "disabled");

        let href = "/loginAttempts/1";
        handler
            .put(href, &json!({"href": href, "account": "x"}), true)
            .await
            .expect("put succeeds trivially");
        assert_eq!(handler.get(href).await.expect("get"), None);
        handler.remove(href).await.expect("remove succeeds trivially");
    }

    #[tokio::test]
    async fn test_missing_region_cache_falls_back_to_disabled() {
        let mut manager = CacheManager::new();
        manager
            .create_cache(
                Region::Groups,
                &crate::manager::CacheOptions::default().with_store(StoreKind::Memory),
            )
            .expect("create");
        let handler = CacheHandler::new(manager);
        assert_eq!(handler.cache_for(Some("/accounts/1")).store_name(), "disabled");
        assert_eq!(handler.cache_for(Some("/groups/1")).store_name(), "memory");
    }

    #[tokio::test]
    async fn test_remove_is_shallow() {
        let handler = handler();
        let data = json!({"href": "/groups/1", "tenant": {"href": "/tenants/1", "name": "t"}});
        handler.put("/groups/1", &data, true).await.expect("put");
        handler.remove("/groups/1").await.expect("remove");
        assert!(handler.get("/groups/1").await.expect("get").is_none());
        assert!(handler.get("/tenants/1").await.expect("get").is_some());
    }
}
