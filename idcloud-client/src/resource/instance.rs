use std::collections::{BTreeMap, BTreeSet};
use std::sync::Weak;

use idcloud_core::{href_of, ClientError, IdCloudError, IdCloudResult};
use serde_json::{Map, Value};

use super::{Instantiated, ResourceKind};
use crate::data_store::{DataStore, DataStoreInner};

const CUSTOM_DATA_FIELD: &str = "customData";

/// A single resource: raw properties plus typed expanded children.
///
/// Expanded children are authoritative for the fields they occupy. Editing a
/// child through [`Resource::expanded_mut`] or [`Resource::custom_data_mut`]
/// does not rewrite the raw property; [`Resource::to_body`] merges the edited
/// custom data back in when saving.
#[derive(Debug, Clone)]
pub struct Resource {
    kind: ResourceKind,
    properties: Map<String, Value>,
    expanded: BTreeMap<String, Instantiated>,
    removed: BTreeSet<String>,
    data_store: Weak<DataStoreInner>,
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.properties == other.properties
            && self.expanded == other.expanded
            && self.removed == other.removed
    }
}

impl Resource {
    pub(crate) fn new(
        kind: ResourceKind,
        properties: Map<String, Value>,
        data_store: Weak<DataStoreInner>,
    ) -> Self {
        Self {
            kind,
            properties,
            expanded: BTreeMap::new(),
            removed: BTreeSet::new(),
            data_store,
        }
    }

    /// A resource not attached to any data store.
    ///
    /// Useful for building request bodies; `save`, `delete` and `invalidate`
    /// fail with [`ClientError::DataStoreDropped`].
    pub fn detached(kind: ResourceKind, properties: Map<String, Value>) -> Self {
        Self::new(kind, properties, Weak::new())
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn href(&self) -> Option<&str> {
        self.properties.get("href").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.properties.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.properties.get(field).and_then(Value::as_str)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Set a property, dropping any expanded child for the same field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        self.expanded.remove(&field);
        self.removed.remove(&field);
        self.properties.insert(field, value.into());
    }

    /// Remove a property and remember it for the next save.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let old = self.properties.remove(field)?;
        self.expanded.remove(field);
        self.removed.insert(field.to_string());
        Some(old)
    }

    /// Fields removed since this resource was instantiated.
    pub fn removed_fields(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(String::as_str)
    }

    pub(crate) fn has_removed_fields(&self) -> bool {
        !self.removed.is_empty()
    }

    pub fn expanded(&self, field: &str) -> Option<&Instantiated> {
        self.expanded.get(field)
    }

    pub fn expanded_mut(&mut self, field: &str) -> Option<&mut Instantiated> {
        self.expanded.get_mut(field)
    }

    pub fn expanded_fields(&self) -> impl Iterator<Item = &str> {
        self.expanded.keys().map(String::as_str)
    }

    pub(crate) fn insert_expanded(&mut self, field: String, value: Instantiated) {
        self.expanded.insert(field, value);
    }

    /// The custom data attached to this resource, when it was returned inline.
    pub fn custom_data(&self) -> Option<&Resource> {
        self.expanded
            .get(CUSTOM_DATA_FIELD)
            .and_then(Instantiated::as_instance)
    }

    pub fn custom_data_mut(&mut self) -> Option<&mut Resource> {
        self.expanded
            .get_mut(CUSTOM_DATA_FIELD)
            .and_then(Instantiated::as_instance_mut)
    }

    /// Hrefs of every resource this one references, its own excluded.
    ///
    /// Covers reference stubs in the raw properties and, recursively, every
    /// expanded child and collection item.
    pub fn reference_hrefs(&self) -> Vec<String> {
        let mut hrefs = BTreeSet::new();
        self.collect_references(&mut hrefs);
        if let Some(own) = self.href() {
            hrefs.remove(own);
        }
        hrefs.into_iter().collect()
    }

    fn collect_references(&self, hrefs: &mut BTreeSet<String>) {
        for href in self.properties.values().filter_map(href_of) {
            hrefs.insert(href.to_string());
        }
        for child in self.expanded.values() {
            match child {
                Instantiated::Instance(resource) => {
                    if let Some(href) = resource.href() {
                        hrefs.insert(href.to_string());
                    }
                    resource.collect_references(hrefs);
                }
                Instantiated::Collection(collection) => {
                    for item in collection.items() {
                        if let Some(href) = item.href() {
                            hrefs.insert(href.to_string());
                        }
                        item.collect_references(hrefs);
                    }
                }
            }
        }
    }

    /// Request body for saving this resource.
    pub fn to_body(&self) -> Value {
        let mut body = self.properties.clone();
        for (field, child) in &self.expanded {
            if let Instantiated::Instance(child) = child {
                if child.kind == ResourceKind::CustomData {
                    body.insert(field.clone(), child.to_body());
                }
            }
        }
        Value::Object(body)
    }

    fn data_store(&self) -> IdCloudResult<DataStore> {
        self.data_store
            .upgrade()
            .map(DataStore::from_inner)
            .ok_or(IdCloudError::Client(ClientError::DataStoreDropped))
    }

    /// Persist this resource. Returns the server's view of it.
    pub async fn save(&self) -> IdCloudResult<Resource> {
        self.data_store()?.save_resource(self).await
    }

    pub async fn delete(&self) -> IdCloudResult<()> {
        self.data_store()?.delete_resource(self).await
    }

    /// Evict this resource and everything it references from the cache.
    pub async fn invalidate(&self) -> IdCloudResult<()> {
        self.data_store()?.invalidate(self).await;
        Ok(())
    }
}
