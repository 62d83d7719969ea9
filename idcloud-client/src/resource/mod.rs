//! In-memory resource model.
//!
//! A [`Resource`] is a property bag plus the expanded children that were
//! requested with it. Typed wrappers such as [`Account`] add a
//! [`ResourceKind`] tag and a few accessors; everything else goes through
//! the generic property API.

mod collection;
mod instance;
mod kind;
mod types;

pub use collection::CollectionResource;
pub use instance::Resource;
pub use kind::ResourceKind;
pub use types::{
    Account, AccountStoreMapping, ApiKey, Application, CustomData, Directory, Factor,
    GoogleAuthenticatorFactor, Group, GroupMembership, IdSiteNonce, SmsFactor, Tenant,
};

/// A typed view over a [`Resource`].
pub trait InstanceType: Sized {
    /// Kind requested when fetching or creating this type.
    const KIND: ResourceKind;

    fn from_resource(resource: Resource) -> Self;

    fn resource(&self) -> &Resource;

    fn resource_mut(&mut self) -> &mut Resource;

    fn into_resource(self) -> Resource;
}

/// Result of instantiating a payload: one resource or a collection page.
#[derive(Debug, Clone, PartialEq)]
pub enum Instantiated {
    Instance(Resource),
    Collection(CollectionResource),
}

impl Instantiated {
    pub fn href(&self) -> Option<&str> {
        match self {
            Instantiated::Instance(resource) => resource.href(),
            Instantiated::Collection(collection) => collection.href(),
        }
    }

    pub fn as_instance(&self) -> Option<&Resource> {
        match self {
            Instantiated::Instance(resource) => Some(resource),
            Instantiated::Collection(_) => None,
        }
    }

    pub fn as_instance_mut(&mut self) -> Option<&mut Resource> {
        match self {
            Instantiated::Instance(resource) => Some(resource),
            Instantiated::Collection(_) => None,
        }
    }

    pub fn into_instance(self) -> Option<Resource> {
        match self {
            Instantiated::Instance(resource) => Some(resource),
            Instantiated::Collection(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionResource> {
        match self {
            Instantiated::Collection(collection) => Some(collection),
            Instantiated::Instance(_) => None,
        }
    }

    pub fn into_collection(self) -> Option<CollectionResource> {
        match self {
            Instantiated::Collection(collection) => Some(collection),
            Instantiated::Instance(_) => None,
        }
    }

    /// Convert into a typed instance, if this is a single resource.
    pub fn into_typed<T: InstanceType>(self) -> Option<T> {
        self.into_instance().map(T::from_resource)
    }
}
