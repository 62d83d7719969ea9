//! Cache store backends.
//!
//! A store is raw key/value persistence with no expiry logic of its own;
//! expiry lives in [`crate::Cache`]. Backends are selected through a
//! [`StoreRegistry`] keyed by [`StoreKind`], or supplied directly as a
//! [`StoreFactory`].

mod disabled;
mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use disabled::DisabledStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use idcloud_core::{ConfigError, IdCloudResult, RedisConfig, StoreKind};

use crate::entry::CacheEntry;

/// Cache store trait for pluggable persistence.
///
/// Implementations must be thread-safe. A missing key is `Ok(None)`, never an
/// error.
#[async_trait]
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> IdCloudResult<Option<CacheEntry>>;

    /// Store `entry`, overwriting any previous one.
    async fn set(&self, key: &str, entry: CacheEntry) -> IdCloudResult<()>;

    /// Remove `key`. Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> IdCloudResult<bool>;

    async fn clear(&self) -> IdCloudResult<()>;

    async fn size(&self) -> IdCloudResult<usize>;
}

/// Options handed to a store factory.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Time-to-live in seconds; stores that support expiry use it as a hint.
    pub ttl: u64,
    pub tti: u64,
    pub redis: Option<RedisConfig>,
    /// Region the store serves; shared backends keep regions apart by it.
    pub namespace: Option<String>,
}

impl StoreOptions {
    /// Key prefix for a shared backend: `base` followed by `{namespace}:`.
    pub fn key_prefix(&self, base: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}{}:", base, namespace),
            None => base.to_string(),
        }
    }
}

/// Constructor for a store.
pub type StoreFactory =
    Arc<dyn Fn(&StoreOptions) -> IdCloudResult<Arc<dyn CacheStore>> + Send + Sync>;

/// How a cache obtains its store.
#[derive(Clone)]
pub enum StoreSpec {
    /// Look the kind up in the registry.
    Kind(StoreKind),
    /// Caller-provided constructor.
    Factory(StoreFactory),
}

impl Default for StoreSpec {
    fn default() -> Self {
        StoreSpec::Kind(StoreKind::default())
    }
}

impl From<StoreKind> for StoreSpec {
    fn from(kind: StoreKind) -> Self {
        StoreSpec::Kind(kind)
    }
}

impl fmt::Debug for StoreSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSpec::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            StoreSpec::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Registry of store constructors keyed by kind.
#[derive(Clone)]
pub struct StoreRegistry {
    factories: HashMap<StoreKind, StoreFactory>,
}

impl StoreRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every backend compiled into this build.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(StoreKind::Memory, Arc::new(build_memory));
        registry.register(StoreKind::Disabled, Arc::new(build_disabled));
        #[cfg(feature = "redis")]
        registry.register(StoreKind::Redis, Arc::new(build_redis));
        registry
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register(&mut self, kind: StoreKind, factory: StoreFactory) {
        self.factories.insert(kind, factory);
    }

    pub fn contains(&self, kind: StoreKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Build a store for `spec`.
    pub fn build(&self, spec: &StoreSpec, options: &StoreOptions) -> IdCloudResult<Arc<dyn CacheStore>> {
        match spec {
            StoreSpec::Factory(factory) => factory(options),
            StoreSpec::Kind(kind) => {
                let factory = self.factories.get(kind).ok_or_else(|| ConfigError::InvalidValue {
                    field: "cache.store".to_string(),
                    reason: format!("store kind '{}' is not available in this build", kind.as_str()),
                })?;
                factory(options)
            }
        }
    }
}

fn build_memory(_: &StoreOptions) -> IdCloudResult<Arc<dyn CacheStore>> {
    Ok(Arc::new(MemoryStore::new()))
}

fn build_disabled(_: &StoreOptions) -> IdCloudResult<Arc<dyn CacheStore>> {
    Ok(Arc::new(DisabledStore))
}

#[cfg(feature = "redis")]
fn build_redis(options: &StoreOptions) -> IdCloudResult<Arc<dyn CacheStore>> {
    Ok(Arc::new(RedisStore::from_options(options)?))
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
