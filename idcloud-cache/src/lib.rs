//! idcloud Cache - multi-region resource cache.
//!
//! Every resource returned by the service is cached under its own `href` in
//! a region named after its collection (`accounts`, `groups`, ...). Each
//! region is a [`Cache`] with independent time-to-live and time-to-idle
//! limits over a pluggable [`CacheStore`].
//!
//! # Layers
//!
//! - [`CacheEntry`]: value plus creation and last-access timestamps
//! - [`CacheStore`]: raw key/value persistence (memory, disabled, redis)
//! - [`Cache`]: expiry semantics and hit/miss statistics over one store
//! - [`CacheManager`]: one cache per [`Region`]
//! - [`CacheHandler`]: href routing and decomposition of nested payloads
//!
//! # Example
//!
//! ```ignore
//! let handler = CacheHandler::from_config(&CacheConfig::default())?;
//! handler.put("/accounts/42", &body, true).await?;
//! let cached = handler.get("/accounts/42").await?;
//! ```

pub mod cache;
pub mod clock;
pub mod entry;
pub mod handler;
pub mod manager;
pub mod region;
pub mod stats;
pub mod store;

pub use cache::Cache;
pub use clock::{Clock, SystemClock};
pub use entry::CacheEntry;
pub use handler::{build_cacheable_resources, CacheHandler};
pub use manager::{CacheManager, CacheOptions};
pub use region::Region;
pub use stats::{CacheStats, StatsCounter};
pub use store::{
    CacheStore, DisabledStore, MemoryStore, StoreFactory, StoreOptions, StoreRegistry, StoreSpec,
};

#[cfg(feature = "redis")]
pub use store::RedisStore;
