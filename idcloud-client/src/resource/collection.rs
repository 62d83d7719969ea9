use std::sync::Weak;

use idcloud_core::{ClientError, IdCloudError, IdCloudResult, Query};

use super::{InstanceType, Resource, ResourceKind};
use crate::data_store::{DataStore, DataStoreInner, GetOptions};

/// One page of a collection.
#[derive(Debug, Clone)]
pub struct CollectionResource {
    href: Option<String>,
    offset: u64,
    limit: u64,
    size: Option<u64>,
    query: Option<Query>,
    item_kind: ResourceKind,
    items: Vec<Resource>,
    data_store: Weak<DataStoreInner>,
}

impl PartialEq for CollectionResource {
    fn eq(&self, other: &Self) -> bool {
        self.href == other.href
            && self.offset == other.offset
            && self.limit == other.limit
            && self.size == other.size
            && self.query == other.query
            && self.item_kind == other.item_kind
            && self.items == other.items
    }
}

impl CollectionResource {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        href: Option<String>,
        offset: u64,
        limit: u64,
        size: Option<u64>,
        query: Option<Query>,
        item_kind: ResourceKind,
        items: Vec<Resource>,
        data_store: Weak<DataStoreInner>,
    ) -> Self {
        Self {
            href,
            offset,
            limit,
            size,
            query,
            item_kind,
            items,
            data_store,
        }
    }

    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Total number of items across all pages, when the service reports it.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// The query this page was requested with.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn item_kind(&self) -> ResourceKind {
        self.item_kind
    }

    pub fn items(&self) -> &[Resource] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Resource> {
        self.items
    }

    /// Items converted to a typed wrapper.
    pub fn typed_items<T: InstanceType>(&self) -> Vec<T> {
        self.items.iter().cloned().map(T::from_resource).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether another page may follow this one.
    ///
    /// Uses the reported `size` when present; otherwise a full page means
    /// there may be more.
    pub fn has_next_page(&self) -> bool {
        if self.href.is_none() || self.limit == 0 {
            return false;
        }
        match self.size {
            Some(size) => self.offset.saturating_add(self.items.len() as u64) < size,
            None => self.items.len() as u64 >= self.limit,
        }
    }

    /// Fetch the page after this one, keeping every other query parameter.
    pub async fn next_page(&self) -> IdCloudResult<Option<CollectionResource>> {
        if !self.has_next_page() {
            return Ok(None);
        }
        let Some(href) = self.href.as_deref() else {
            return Ok(None);
        };
        let query = self
            .query
            .clone()
            .unwrap_or_default()
            .with_offset(self.offset.saturating_add(self.limit))
            .with_limit(self.limit);
        let data_store = self
            .data_store
            .upgrade()
            .map(DataStore::from_inner)
            .ok_or(IdCloudError::Client(ClientError::DataStoreDropped))?;
        let options = GetOptions::new()
            .with_query(query)
            .with_kind(self.item_kind);
        match data_store.get_resource(href, options).await? {
            Some(page) => page.into_collection().map(Some).ok_or_else(|| {
                ClientError::InvalidResponse {
                    reason: format!("expected a collection page from {}", href),
                }
                .into()
            }),
            None => Ok(None),
        }
    }

    /// This page's items followed by those of every later page.
    pub async fn fetch_all(self) -> IdCloudResult<Vec<Resource>> {
        let mut page = self;
        let mut items = Vec::new();
        loop {
            let next = page.next_page().await?;
            items.extend(page.items);
            match next {
                Some(next) if !next.is_empty() => page = next,
                _ => return Ok(items),
            }
        }
    }
}
