//! Turning raw JSON payloads into resources.

use std::sync::Weak;

use idcloud_core::{is_collection_data, ClientError, IdCloudResult, Query};
use serde_json::{Map, Value};

use crate::data_store::DataStoreInner;
use crate::resource::{CollectionResource, Instantiated, Resource, ResourceKind};

const CUSTOM_DATA_FIELD: &str = "customData";

/// Instantiate `data` as `kind`.
///
/// - `kind` must be an instance kind; asking for a collection is an error.
/// - `None` or `null` data yields `Ok(None)`.
/// - Collection-shaped data becomes a [`CollectionResource`] whose items are
///   instantiated as `kind`, keeping `offset`, `limit`, `href` and `query`.
/// - Each field named by the query's `expand` parameter is instantiated with
///   the kind its name maps to. A field with no matching kind, or one that
///   fails to instantiate, is logged and left as raw data.
/// - An inline `customData` object is always instantiated as custom data.
pub(crate) fn instantiate(
    kind: ResourceKind,
    data: Option<Value>,
    query: Option<&Query>,
    data_store: &Weak<DataStoreInner>,
) -> IdCloudResult<Option<Instantiated>> {
    if !kind.is_instance() {
        return Err(ClientError::InvalidArgument {
            argument: "kind".to_string(),
            reason: format!("{} is not an instance kind", kind),
        }
        .into());
    }

    let data = match data {
        None | Some(Value::Null) => return Ok(None),
        Some(data) => data,
    };

    if is_collection_data(&data) {
        return instantiate_collection(kind, data, query, data_store)
            .map(|collection| Some(Instantiated::Collection(collection)));
    }

    match data {
        Value::Object(properties) => {
            instantiate_instance(kind, properties, query, data_store)
                .map(|resource| Some(Instantiated::Instance(resource)))
        }
        other => Err(ClientError::InvalidResponse {
            reason: format!("expected a JSON object for {}, got {}", kind, json_type(&other)),
        }
        .into()),
    }
}

fn instantiate_collection(
    kind: ResourceKind,
    data: Value,
    query: Option<&Query>,
    data_store: &Weak<DataStoreInner>,
) -> IdCloudResult<CollectionResource> {
    let Value::Object(mut page) = data else {
        return Err(ClientError::InvalidResponse {
            reason: "collection page is not an object".to_string(),
        }
        .into());
    };

    let offset = page.get("offset").and_then(Value::as_u64).unwrap_or(0);
    let limit = page.get("limit").and_then(Value::as_u64).unwrap_or(0);
    let size = page.get("size").and_then(Value::as_u64);
    let href = page.get("href").and_then(Value::as_str).map(str::to_string);

    let raw_items = match page.remove("items") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(ClientError::InvalidResponse {
                reason: "collection items is not an array".to_string(),
            }
            .into())
        }
    };

    let mut items = Vec::with_capacity(raw_items.len());
    for item in raw_items {
        match item {
            Value::Object(properties) => {
                items.push(instantiate_instance(kind, properties, query, data_store)?);
            }
            other => {
                return Err(ClientError::InvalidResponse {
                    reason: format!("collection item is {}, expected an object", json_type(&other)),
                }
                .into())
            }
        }
    }

    Ok(CollectionResource::new(
        href,
        offset,
        limit,
        size,
        query.cloned(),
        kind,
        items,
        data_store.clone(),
    ))
}

fn instantiate_instance(
    kind: ResourceKind,
    properties: Map<String, Value>,
    query: Option<&Query>,
    data_store: &Weak<DataStoreInner>,
) -> IdCloudResult<Resource> {
    let kind = kind.resolve(&properties);
    let mut resource = Resource::new(kind, properties, data_store.clone());

    for field in query.map(Query::expand_fields).unwrap_or_default() {
        let Some(value) = resource.get(field).filter(|value| value.is_object()).cloned() else {
            continue;
        };
        let Some(field_kind) = ResourceKind::for_field(field) else {
            tracing::warn!(field, parent = %kind, "No resource kind for expanded field; leaving raw");
            continue;
        };
        match instantiate(field_kind, Some(value), None, data_store) {
            Ok(Some(child)) => resource.insert_expanded(field.to_string(), child),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, field, parent = %kind, "Failed to instantiate expanded field");
            }
        }
    }

    if kind != ResourceKind::CustomData && resource.expanded(CUSTOM_DATA_FIELD).is_none() {
        if let Some(Value::Object(custom)) = resource.get(CUSTOM_DATA_FIELD).cloned() {
            let custom = instantiate_instance(ResourceKind::CustomData, custom, None, data_store)?;
            resource.insert_expanded(CUSTOM_DATA_FIELD.to_string(), Instantiated::Instance(custom));
        }
    }

    Ok(resource)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detached(kind: ResourceKind, data: Value, query: Option<&Query>) -> IdCloudResult<Option<Instantiated>> {
        instantiate(kind, Some(data), query, &Weak::new())
    }

    #[test]
    fn test_null_and_missing_yield_none() {
        assert_eq!(instantiate(ResourceKind::Account, None, None, &Weak::new()), Ok(None));
        assert_eq!(detached(ResourceKind::Account, Value::Null, None), Ok(None));
    }

    #[test]
    fn test_collection_kind_rejected() {
        let err = detached(ResourceKind::Collection, json!({"href": "/x"}), None).expect_err("rejected");
        assert!(matches!(
            err,
            idcloud_core::IdCloudError::Client(ClientError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_plain_instance() {
        let data = json!({"href": "/accounts/1", "email": "a@b.com"});
        let resource = detached(ResourceKind::Account, data.clone(), None)
            .expect("instantiate")
            .and_then(Instantiated::into_instance)
            .expect("instance");
        assert_eq!(resource.kind(), ResourceKind::Account);
        assert_eq!(Value::Object(resource.properties().clone()), data);
        assert_eq!(resource.expanded_fields().count(), 0);
    }

    #[test]
    fn test_collection_page() {
        let query = Query::new().with_limit(2).with("email", "*@b.com");
        let data = json!({
            "href": "/applications/1/accounts",
            "offset": 0,
            "limit": 2,
            "size": 3,
            "items": [{"href": "/accounts/1"}, {"href": "/accounts/2"}]
        });
        let page = detached(ResourceKind::Account, data, Some(&query))
            .expect("instantiate")
            .and_then(Instantiated::into_collection)
            .expect("collection");
        assert_eq!(page.href(), Some("/applications/1/accounts"));
        assert_eq!((page.offset(), page.limit(), page.size()), (0, 2, Some(3)));
        assert_eq!(page.query(), Some(&query));
        assert!(page.items().iter().all(|item| item.kind() == ResourceKind::Account));
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn test_expand_instantiates_children() {
        let query = Query::new().with_expand("directory,groups(offset:0,limit:25)");
        let data = json!({
            "href": "/accounts/1",
            "directory": {"href": "/directories/2", "name": "dir"},
            "groups": {
                "href": "/accounts/1/groups",
                "offset": 0,
                "limit": 25,
                "items": [{"href": "/groups/7", "name": "admins"}]
            },
            "tenant": {"href": "/tenants/3"}
        });
        let account = detached(ResourceKind::Account, data, Some(&query))
            .expect("instantiate")
            .and_then(Instantiated::into_instance)
            .expect("instance");

        let directory = account
            .expanded("directory")
            .and_then(Instantiated::as_instance)
            .expect("directory");
        assert_eq!(directory.kind(), ResourceKind::Directory);

        let groups = account
            .expanded("groups")
            .and_then(Instantiated::as_collection)
            .expect("groups");
        assert_eq!(groups.items()[0].kind(), ResourceKind::Group);
        assert!(account.expanded("tenant").is_none());
    }

    #[test]
    fn test_unknown_expand_field_is_skipped() {
        let query = Query::new().with_expand("providerData,directory");
        let data = json!({
            "href": "/accounts/1",
            "providerData": {"href": "/accounts/1/providerData", "providerId": "idcloud"},
            "directory": {"href": "/directories/2", "name": "dir"}
        });
        let account = detached(ResourceKind::Account, data, Some(&query))
            .expect("unknown fields do not fail the parent")
            .and_then(Instantiated::into_instance)
            .expect("instance");
        assert!(account.expanded("providerData").is_none());
        assert!(account.expanded("directory").is_some());
        assert!(account.get("providerData").is_some());
    }

    #[test]
    fn test_bad_expanded_child_is_skipped() {
        let query = Query::new().with_expand("groups");
        let data = json!({
            "href": "/accounts/1",
            "groups": {"href": "/accounts/1/groups", "offset": 0, "limit": 25, "items": "broken"}
        });
        let account = detached(ResourceKind::Account, data, Some(&query))
            .expect("child failure does not fail the parent")
            .and_then(Instantiated::into_instance)
            .expect("instance");
        assert!(account.expanded("groups").is_none());
    }

    #[test]
    fn test_custom_data_always_wrapped() {
        let data = json!({
            "href": "/groups/1",
            "customData": {"href": "/groups/1/customData", "color": "red"}
        });
        let group = detached(ResourceKind::Group, data, None)
            .expect("instantiate")
            .and_then(Instantiated::into_instance)
            .expect("instance");
        let custom = group.custom_data().expect("custom data");
        assert_eq!(custom.kind(), ResourceKind::CustomData);
        assert_eq!(custom.get_str("color"), Some("red"));
    }

    #[test]
    fn test_factor_subtype_from_type_field() {
        let data = json!({
            "href": "/accounts/1/factors",
            "offset": 0,
            "limit": 25,
            "items": [
                {"href": "/factors/1", "type": "SMS"},
                {"href": "/factors/2", "type": "google-authenticator"}
            ]
        });
        let page = detached(ResourceKind::Factor, data, None)
            .expect("instantiate")
            .and_then(Instantiated::into_collection)
            .expect("collection");
        let kinds: Vec<_> = page.items().iter().map(|item| item.kind()).collect();
        assert_eq!(
            kinds,
            vec![ResourceKind::SmsFactor, ResourceKind::GoogleAuthenticatorFactor]
        );
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(detached(ResourceKind::Account, json!("text"), None).is_err());
    }
}
