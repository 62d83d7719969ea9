//! The data store: cache-aware resource reads and writes.
//!
//! Reads consult the region cache first. A miss, or a cache that fails,
//! falls through to the network, and the response is decomposed into the
//! cache before it is instantiated. Cache failures on any path are logged,
//! counted and otherwise ignored; only network and argument errors reach the
//! caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::join_all;
use idcloud_cache::{CacheHandler, CacheManager};
use idcloud_core::{
    href_of, CacheConfig, ClientConfig, ClientError, ConfigError, IdCloudError, IdCloudResult,
    Query,
};
use serde_json::Value;

use crate::executor::{HttpRequestExecutor, RequestDescriptor, RequestExecutor};
use crate::factory::instantiate;
use crate::resource::{CollectionResource, InstanceType, Instantiated, Resource, ResourceKind};

/// Options for [`DataStore::get_resource`].
#[derive(Debug, Clone, PartialEq)]
pub struct GetOptions {
    pub query: Option<Query>,
    pub kind: ResourceKind,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            query: None,
            kind: ResourceKind::Instance,
        }
    }
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Options for [`DataStore::create_resource`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOptions {
    pub query: Option<Query>,
    pub kind: ResourceKind,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            query: None,
            kind: ResourceKind::Instance,
        }
    }
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug)]
pub(crate) struct DataStoreInner {
    executor: Arc<dyn RequestExecutor>,
    cache: CacheHandler,
    cache_failures: AtomicU64,
}

/// Cache-aware gateway to the remote API.
///
/// Cheap to clone. Resources keep a weak handle back to the store, so they
/// stop working once every `DataStore` clone is dropped.
#[derive(Debug, Clone)]
pub struct DataStore {
    inner: Arc<DataStoreInner>,
}

impl DataStore {
    pub fn new(executor: Arc<dyn RequestExecutor>, cache: CacheHandler) -> Self {
        Self {
            inner: Arc::new(DataStoreInner {
                executor,
                cache,
                cache_failures: AtomicU64::new(0),
            }),
        }
    }

    pub fn builder() -> DataStoreBuilder {
        DataStoreBuilder::default()
    }

    /// HTTP executor and region caches built from `config`.
    pub fn from_config(config: &ClientConfig) -> IdCloudResult<Self> {
        Self::builder().client_config(config.clone()).build()
    }

    pub(crate) fn from_inner(inner: Arc<DataStoreInner>) -> Self {
        Self { inner }
    }

    fn weak(&self) -> Weak<DataStoreInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn cache_handler(&self) -> &CacheHandler {
        &self.inner.cache
    }

    /// Instantiate raw `data` as `kind`, attached to this store.
    ///
    /// Follows the same rules as responses fetched through the store: `null`
    /// yields `None`, collection pages become [`CollectionResource`] and
    /// `expand` fields in `query` are instantiated as typed children.
    pub fn instantiate(
        &self,
        kind: ResourceKind,
        data: Option<Value>,
        query: Option<&Query>,
    ) -> IdCloudResult<Option<Instantiated>> {
        instantiate(kind, data, query, &self.weak())
    }

    /// Number of cache operations that failed and were ignored.
    pub fn cache_failures(&self) -> u64 {
        self.inner.cache_failures.load(Ordering::Relaxed)
    }

    /// Fetch `href`, from the cache when possible.
    ///
    /// With `expand` fields in the query, a cache hit requires every expanded
    /// child to be cached as well. Returns `Ok(None)` when the service
    /// responds without a body.
    pub async fn get_resource(
        &self,
        href: &str,
        options: GetOptions,
    ) -> IdCloudResult<Option<Instantiated>> {
        require_instance_kind(options.kind)?;
        let query = options.query.as_ref();
        let expand = query.map(Query::expand_fields).unwrap_or_default();

        let cached = if expand.is_empty() {
            self.inner.cache.get(href).await
        } else {
            self.inner.cache.get_expanded(href, &expand).await
        };
        match cached {
            Ok(Some(value)) => {
                tracing::trace!(href, "Cache hit");
                return instantiate(options.kind, Some(value), query, &self.weak());
            }
            Ok(None) => {}
            Err(e) => self.record_cache_failure("read", href, &e),
        }

        let request = RequestDescriptor::get(href).with_query(options.query.clone());
        let body = self.inner.executor.execute(request).await?;
        if let Some(body) = &body {
            self.populate(href, body, true).await;
        }
        instantiate(options.kind, body, query, &self.weak())
    }

    /// Fetch a single resource as `T`.
    pub async fn get<T: InstanceType>(&self, href: &str) -> IdCloudResult<Option<T>> {
        self.get_with(href, None).await
    }

    /// Fetch a single resource as `T` with query parameters (usually `expand`).
    pub async fn get_with<T: InstanceType>(
        &self,
        href: &str,
        query: Option<Query>,
    ) -> IdCloudResult<Option<T>> {
        let options = GetOptions {
            query,
            kind: T::KIND,
        };
        match self.get_resource(href, options).await? {
            Some(Instantiated::Instance(resource)) => Ok(Some(T::from_resource(resource))),
            Some(Instantiated::Collection(_)) => Err(unexpected_shape(href, "a collection page", T::KIND)),
            None => Ok(None),
        }
    }

    /// Fetch one collection page whose items are `kind`.
    pub async fn get_collection(
        &self,
        href: &str,
        kind: ResourceKind,
        query: Option<Query>,
    ) -> IdCloudResult<Option<CollectionResource>> {
        match self.get_resource(href, GetOptions { query, kind }).await? {
            Some(Instantiated::Collection(page)) => Ok(Some(page)),
            Some(Instantiated::Instance(_)) => Err(unexpected_shape(href, "a single resource", kind)),
            None => Ok(None),
        }
    }

    /// POST `data` to `parent_href` and cache the created resource.
    pub async fn create_resource(
        &self,
        parent_href: &str,
        data: Value,
        options: CreateOptions,
    ) -> IdCloudResult<Resource> {
        require_instance_kind(options.kind)?;
        let query = options.query.as_ref();

        let request = RequestDescriptor::post(parent_href, data).with_query(options.query.clone());
        let body = self
            .inner
            .executor
            .execute(request)
            .await?
            .ok_or_else(|| empty_response(parent_href))?;

        let href = href_of(&body).unwrap_or(parent_href).to_string();
        self.populate(&href, &body, true).await;
        into_resource(instantiate(options.kind, Some(body), query, &self.weak())?, parent_href)
    }

    /// Create a resource of type `T` under `parent_href`.
    pub async fn create<T: InstanceType>(&self, parent_href: &str, data: Value) -> IdCloudResult<T> {
        let options = CreateOptions::new().with_kind(T::KIND);
        self.create_resource(parent_href, data, options)
            .await
            .map(T::from_resource)
    }

    /// POST the resource to its own href and cache the result as an update.
    ///
    /// Custom data keys removed since the resource was loaded are deleted
    /// first, one request per key. The returned resource has the same kind
    /// as the one saved.
    pub async fn save_resource(&self, resource: &Resource) -> IdCloudResult<Resource> {
        let href = require_href(resource)?;
        self.delete_removed_custom_data(resource).await?;

        let request = RequestDescriptor::post(href, resource.to_body());
        let body = self
            .inner
            .executor
            .execute(request)
            .await?
            .ok_or_else(|| empty_response(href))?;

        // Save responses usually hold only a customData stub.
        if let Some(custom_href) = saved_custom_data_href(resource) {
            self.evict(custom_href).await;
        }
        self.populate(href, &body, false).await;
        into_resource(instantiate(resource.kind(), Some(body), None, &self.weak())?, href)
    }

    /// Evict the resource from the cache, then DELETE it remotely.
    pub async fn delete_resource(&self, resource: &Resource) -> IdCloudResult<()> {
        let href = require_href(resource)?;
        self.evict(href).await;
        self.inner
            .executor
            .execute(RequestDescriptor::delete(href))
            .await?;
        Ok(())
    }

    /// Drop `href` from its cache region.
    pub async fn evict(&self, href: &str) {
        if let Err(e) = self.inner.cache.remove(href).await {
            self.record_cache_failure("evict", href, &e);
        }
    }

    /// Evict `resource` and every resource it references.
    pub async fn invalidate(&self, resource: &Resource) {
        let mut hrefs = resource.reference_hrefs();
        if let Some(href) = resource.href() {
            hrefs.push(href.to_string());
        }
        tracing::debug!(count = hrefs.len(), "Invalidating cached resources");
        join_all(hrefs.iter().map(|href| self.evict(href))).await;
    }

    async fn delete_removed_custom_data(&self, resource: &Resource) -> IdCloudResult<()> {
        let targets = [Some(resource), resource.custom_data()];
        for custom in targets
            .into_iter()
            .flatten()
            .filter(|r| r.kind() == ResourceKind::CustomData && r.has_removed_fields())
        {
            let Some(custom_href) = custom.href() else {
                continue;
            };
            for key in custom.removed_fields() {
                let uri = format!("{}/{}", custom_href, key);
                self.inner
                    .executor
                    .execute(RequestDescriptor::delete(uri))
                    .await?;
            }
            self.evict(custom_href).await;
        }
        Ok(())
    }

    async fn populate(&self, href: &str, body: &Value, is_new: bool) {
        if let Err(e) = self.inner.cache.put(href, body, is_new).await {
            self.record_cache_failure("populate", href, &e);
        }
    }

    fn record_cache_failure(&self, operation: &'static str, href: &str, error: &IdCloudError) {
        self.inner.cache_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(error = %error, operation, href, "Cache operation failed; continuing without cache");
    }
}

fn require_instance_kind(kind: ResourceKind) -> IdCloudResult<()> {
    if kind.is_instance() {
        return Ok(());
    }
    Err(ClientError::InvalidArgument {
        argument: "kind".to_string(),
        reason: format!("{} is not an instance kind", kind),
    }
    .into())
}

/// Href of the custom data written by saving `resource`, if any.
fn saved_custom_data_href(resource: &Resource) -> Option<&str> {
    if resource.kind() == ResourceKind::CustomData {
        return resource.href();
    }
    resource.custom_data().and_then(Resource::href)
}

fn require_href(resource: &Resource) -> IdCloudResult<&str> {
    resource.href().ok_or_else(|| {
        ClientError::InvalidArgument {
            argument: "resource".to_string(),
            reason: "resource has no href".to_string(),
        }
        .into()
    })
}

fn empty_response(href: &str) -> IdCloudError {
    ClientError::InvalidResponse {
        reason: format!("{} returned no body", href),
    }
    .into()
}

fn unexpected_shape(href: &str, got: &str, kind: ResourceKind) -> IdCloudError {
    ClientError::InvalidResponse {
        reason: format!("{} returned {} where {} was expected", href, got, kind),
    }
    .into()
}

fn into_resource(instantiated: Option<Instantiated>, href: &str) -> IdCloudResult<Resource> {
    match instantiated {
        Some(Instantiated::Instance(resource)) => Ok(resource),
        Some(Instantiated::Collection(_)) => Err(ClientError::InvalidResponse {
            reason: format!("{} returned a collection page where a resource was expected", href),
        }
        .into()),
        None => Err(empty_response(href)),
    }
}

/// Builder for [`DataStore`].
///
/// A request executor is required, either given directly or built from a
/// [`ClientConfig`]. Caches come from an explicit [`CacheManager`], else the
/// cache config, else the client config's cache section, else defaults.
#[derive(Debug, Default)]
pub struct DataStoreBuilder {
    executor: Option<Arc<dyn RequestExecutor>>,
    client_config: Option<ClientConfig>,
    cache_config: Option<CacheConfig>,
    cache_manager: Option<CacheManager>,
}

impl DataStoreBuilder {
    pub fn request_executor(mut self, executor: Arc<dyn RequestExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = Some(config);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = Some(config);
        self
    }

    pub fn cache_manager(mut self, manager: CacheManager) -> Self {
        self.cache_manager = Some(manager);
        self
    }

    pub fn build(self) -> IdCloudResult<DataStore> {
        if let Some(config) = &self.client_config {
            config.validate()?;
        }

        let executor: Arc<dyn RequestExecutor> = match (self.executor, &self.client_config) {
            (Some(executor), _) => executor,
            (None, Some(config)) => Arc::new(HttpRequestExecutor::new(config)?),
            (None, None) => {
                return Err(ConfigError::MissingRequired {
                    field: "request_executor".to_string(),
                }
                .into())
            }
        };

        let manager = match self.cache_manager {
            Some(manager) => manager,
            None => {
                let config = self
                    .cache_config
                    .or_else(|| self.client_config.map(|config| config.cache))
                    .unwrap_or_default();
                CacheManager::from_config(&config)?
            }
        };

        Ok(DataStore::new(executor, CacheHandler::new(manager)))
    }
}
