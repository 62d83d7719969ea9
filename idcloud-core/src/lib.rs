//! idcloud Core - shared types for the idcloud client data layer.
//!
//! Holds the error taxonomy, client configuration, the request [`Query`]
//! type, and helpers that classify raw JSON payloads (collection pages,
//! reference stubs) independently of any typed resource model.

pub mod config;
pub mod error;
pub mod query;
pub mod shape;

pub use config::{
    ApiKeyConfig, CacheConfig, ClientConfig, RedisConfig, RegionOverride, StoreKind,
    CONFIG_ENV_VAR, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TTL_SECS, DEFAULT_TTI_SECS,
};
pub use error::{CacheError, ClientError, ConfigError, IdCloudError, IdCloudResult, RemoteError};
pub use query::Query;
pub use shape::{href_of, is_collection_data, is_expanded_reference, reference_stub};
