//! Region-to-cache mapping.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use idcloud_core::{CacheConfig, ConfigError, IdCloudResult, RedisConfig, DEFAULT_TTI_SECS, DEFAULT_TTL_SECS};

use crate::cache::Cache;
use crate::clock::Clock;
use crate::region::Region;
use crate::stats::{CacheStats, StatsCounter};
use crate::store::{StoreOptions, StoreRegistry, StoreSpec};

/// Options for building one region's cache.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub store: StoreSpec,
    pub ttl: u64,
    pub tti: u64,
    pub redis: Option<RedisConfig>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            store: StoreSpec::default(),
            ttl: DEFAULT_TTL_SECS,
            tti: DEFAULT_TTI_SECS,
            redis: None,
        }
    }
}

impl CacheOptions {
    /// Options for `region` from a cache configuration, overrides applied.
    pub fn for_region(config: &CacheConfig, region: Region) -> Self {
        let (ttl, tti) = config.timeouts_for(region.as_str());
        Self {
            store: StoreSpec::Kind(config.store),
            ttl,
            tti,
            redis: config.redis.clone(),
        }
    }

    pub fn with_store(mut self, store: impl Into<StoreSpec>) -> Self {
        self.store = store.into();
        self
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tti(mut self, tti: u64) -> Self {
        self.tti = tti;
        self
    }

    fn store_options(&self, region: Region) -> StoreOptions {
        StoreOptions {
            ttl: self.ttl,
            tti: self.tti,
            redis: self.redis.clone(),
            namespace: Some(region.as_str().to_string()),
        }
    }
}

/// Owns one [`Cache`] per region.
#[derive(Debug, Default)]
pub struct CacheManager {
    registry: StoreRegistry,
    caches: HashMap<Region, Cache>,
    clock: Option<Arc<dyn Clock>>,
}

impl CacheManager {
    /// A manager with no caches and the default store registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: StoreRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// Time source for every cache created after this call.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build a cache for every region from `config`.
    ///
    /// Override sections must name known regions.
    pub fn from_config(config: &CacheConfig) -> IdCloudResult<Self> {
        let mut manager = Self::new();
        manager.create_all(config)?;
        Ok(manager)
    }

    /// Create (or replace) a cache for every region from `config`.
    pub fn create_all(&mut self, config: &CacheConfig) -> IdCloudResult<()> {
        for name in config.regions.keys() {
            name.parse::<Region>().map_err(|reason| ConfigError::InvalidValue {
                field: format!("cache.regions.{}", name),
                reason,
            })?;
        }
        for region in Region::ALL {
            self.create_cache(region, &CacheOptions::for_region(config, region))?;
        }
        Ok(())
    }

    /// Create the cache for `region`, replacing any existing one.
    pub fn create_cache(&mut self, region: Region, options: &CacheOptions) -> IdCloudResult<&Cache> {
        let store = self.registry.build(&options.store, &options.store_options(region))?;
        let mut cache = Cache::new(store, options.ttl, options.tti);
        if let Some(clock) = &self.clock {
            cache = cache.with_clock(Arc::clone(clock));
        }
        tracing::trace!(
            region = %region,
            store = cache.store_name(),
            ttl = options.ttl,
            tti = options.tti,
            "Created cache region"
        );
        self.caches.insert(region, cache);
        Ok(&self.caches[&region])
    }

    /// Install a pre-built cache for `region`.
    pub fn insert_cache(&mut self, region: Region, cache: Cache) {
        self.caches.insert(region, cache);
    }

    /// The cache for `region`, if one was created.
    pub fn get_cache(&self, region: Region) -> Option<&Cache> {
        self.caches.get(&region)
    }

    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.caches.keys().copied()
    }

    /// Statistics snapshot per region.
    pub fn stats(&self) -> BTreeMap<Region, CacheStats> {
        self.caches
            .iter()
            .map(|(region, cache)| (*region, cache.stats()))
            .collect()
    }

    /// Live counters per region.
    pub fn stats_counters(&self) -> BTreeMap<Region, Arc<StatsCounter>> {
        self.caches
            .iter()
            .map(|(region, cache)| (*region, cache.stats_counter()))
            .collect()
    }
}
