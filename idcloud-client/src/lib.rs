//! idcloud Client - resource data store.
//!
//! [`DataStore`] mediates every read and write between typed in-memory
//! resources and the remote API: reads are served from the region cache
//! when possible, network responses are decomposed into the cache, and raw
//! JSON is turned into [`Resource`] graphs by [`DataStore::instantiate`].
//!
//! ```ignore
//! let store = DataStore::from_config(&ClientConfig::load()?)?;
//! let account: Option<Account> = store.get("https://api.idcloud.example/v1/accounts/42").await?;
//! ```

#[macro_use]
mod macros;

pub mod data_store;
pub mod executor;
mod factory;
pub mod resource;

pub use data_store::{CreateOptions, DataStore, DataStoreBuilder, GetOptions};
pub use executor::{
    Authenticator, BasicAuthenticator, HttpRequestExecutor, Method, RequestDescriptor,
    RequestExecutor,
};
pub use resource::{
    Account, AccountStoreMapping, ApiKey, Application, CollectionResource, CustomData, Directory,
    Factor, GoogleAuthenticatorFactor, Group, GroupMembership, IdSiteNonce, InstanceType,
    Instantiated, Resource, ResourceKind, SmsFactor, Tenant,
};

pub use idcloud_cache as cache;
pub use idcloud_core::{ClientConfig, ClientError, IdCloudError, IdCloudResult, Query};
