use idcloud_client::cache::{build_cacheable_resources, CacheHandler};
use idcloud_core::{is_expanded_reference, CacheConfig};
use idcloud_test_utils::generators::{arb_flat_resource, arb_nested_resource};
use proptest::prelude::*;
use serde_json::Value;

fn count_resources(value: &Value) -> usize {
    let Some(obj) = value.as_object() else {
        return 0;
    };
    let own = usize::from(obj.get("href").is_some_and(Value::is_string));
    own + obj
        .values()
        .filter(|v| is_expanded_reference(v))
        .map(count_resources)
        .sum::<usize>()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

proptest! {
    #[test]
    fn decomposed_resources_hold_only_stubs(value in arb_nested_resource(3)) {
        let resources = build_cacheable_resources(&value);
        prop_assert_eq!(resources.len(), count_resources(&value));
        for resource in &resources {
            prop_assert!(resource.get("href").is_some_and(Value::is_string));
            prop_assert!(resource.values().all(|field| !is_expanded_reference(field)));
        }
    }

    #[test]
    fn parent_comes_last(value in arb_nested_resource(2)) {
        let resources = build_cacheable_resources(&value);
        let last = resources.last().and_then(|r| r.get("href")).cloned();
        prop_assert_eq!(last, value.get("href").cloned());
    }

    #[test]
    fn flat_resources_cache_unchanged(value in arb_flat_resource()) {
        let resources = build_cacheable_resources(&value);
        prop_assert_eq!(resources.len(), 1);
        prop_assert_eq!(Value::Object(resources[0].clone()), value);
    }

    #[test]
    fn one_level_expansion_recomposes(value in arb_nested_resource(1)) {
        let href = value["href"].as_str().unwrap_or_default().to_string();
        let fields: Vec<String> = value
            .as_object()
            .map(|obj| obj.keys().filter(|k| k.ends_with("Ref")).cloned().collect())
            .unwrap_or_default();
        let field_refs: Vec<&str> = fields.iter().map(String::as_str).collect();

        let handler = CacheHandler::from_config(&CacheConfig::default()).expect("handler");
        let recomposed = runtime().block_on(async {
            handler.put(&href, &value, true).await.expect("put");
            handler.get_expanded(&href, &field_refs).await.expect("get")
        });
        prop_assert_eq!(recomposed, Some(value));
    }
}
