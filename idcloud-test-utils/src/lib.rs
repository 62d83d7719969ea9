//! idcloud Test Utilities
//!
//! Shared test infrastructure for the idcloud workspace:
//! - A scripted request executor that records every call
//! - A cache store that logs operations and can be told to fail
//! - A manually advanced clock
//! - Proptest generators for hrefs and resource payloads
//! - Fixtures for common payloads and data stores

pub use idcloud_cache::{
    Cache, CacheEntry, CacheHandler, CacheManager, CacheOptions, CacheStore, Clock, MemoryStore,
    Region, StoreFactory, StoreOptions, StoreSpec,
};
pub use idcloud_client::{DataStore, Method, RequestDescriptor, RequestExecutor};
pub use idcloud_core::{
    CacheError, ClientError, IdCloudError, IdCloudResult, Query, RemoteError,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// EVENT LOG
// ============================================================================

/// Ordered log shared between test doubles.
///
/// The executor writes `network:METHOD uri` and the recording store writes
/// `cache:op key`, so tests can assert on the interleaving.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().expect("event log lock").push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("event log lock").clone()
    }

    /// Index of the first entry equal to `event`.
    pub fn position(&self, event: &str) -> Option<usize> {
        self.entries().iter().position(|entry| entry == event)
    }

    pub fn clear(&self) {
        self.0.lock().expect("event log lock").clear();
    }
}

// ============================================================================
// SCRIPTED REQUEST EXECUTOR
// ============================================================================

type Scripted = IdCloudResult<Option<Value>>;

/// Request executor that replays scripted responses.
///
/// Responses are keyed by method and uri. Several responses for the same key
/// are returned in order; the last one repeats. Unscripted requests fail
/// with a 404 [`RemoteError`].
#[derive(Debug, Default)]
pub struct StubRequestExecutor {
    responses: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    calls: Mutex<Vec<RequestDescriptor>>,
    log: Option<EventLog>,
}

impl StubRequestExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    fn script(&self, method: Method, uri: &str, response: Scripted) {
        self.responses
            .lock()
            .expect("responses lock")
            .entry((method, uri.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Respond to `method uri` with `body`.
    pub fn respond(&self, method: Method, uri: &str, body: Value) -> &Self {
        self.script(method, uri, Ok(Some(body)));
        self
    }

    /// Respond to `method uri` with no body.
    pub fn respond_empty(&self, method: Method, uri: &str) -> &Self {
        self.script(method, uri, Ok(None));
        self
    }

    /// Fail `method uri` with `error`.
    pub fn fail(&self, method: Method, uri: &str, error: IdCloudError) -> &Self {
        self.script(method, uri, Err(error));
        self
    }

    /// Every request executed so far, in order.
    pub fn calls(&self) -> Vec<RequestDescriptor> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self, method: Method, uri: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|call| call.method == method && call.uri == uri)
            .count()
    }

    fn next_response(&self, request: &RequestDescriptor) -> Scripted {
        let mut responses = self.responses.lock().expect("responses lock");
        let key = (request.method, request.uri.clone());
        match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Ok(None)),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(None)),
            None => Err(RemoteError {
                status: 404,
                code: 404,
                message: format!("no scripted response for {}", request.summary()),
                developer_message: None,
                more_info: None,
            }
            .into()),
        }
    }
}

#[async_trait]
impl RequestExecutor for StubRequestExecutor {
    async fn execute(&self, request: RequestDescriptor) -> IdCloudResult<Option<Value>> {
        if let Some(log) = &self.log {
            log.push(format!("network:{}", request.summary()));
        }
        let response = self.next_response(&request);
        self.calls.lock().expect("calls lock").push(request);
        response
    }
}

// ============================================================================
// RECORDING CACHE STORE
// ============================================================================

/// In-memory store that logs operations and can simulate outages.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    log: EventLog,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Make every `get` fail until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every `set`, `delete` and `clear` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> IdCloudResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheError::Store {
                store: "recording".to_string(),
                reason: format!("simulated {} failure", op),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn get(&self, key: &str) -> IdCloudResult<Option<CacheEntry>> {
        self.log.push(format!("cache:get {}", key));
        self.check(&self.fail_reads, "get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> IdCloudResult<()> {
        self.log.push(format!("cache:set {}", key));
        self.check(&self.fail_writes, "set")?;
        self.inner.set(key, entry).await
    }

    async fn delete(&self, key: &str) -> IdCloudResult<bool> {
        self.log.push(format!("cache:delete {}", key));
        self.check(&self.fail_writes, "delete")?;
        self.inner.delete(key).await
    }

    async fn clear(&self) -> IdCloudResult<()> {
        self.log.push("cache:clear");
        self.check(&self.fail_writes, "clear")?;
        self.inner.clear().await
    }

    async fn size(&self) -> IdCloudResult<usize> {
        self.inner.size().await
    }
}

/// A cache manager whose every region shares `store`.
///
/// Built through a [`StoreSpec::Factory`], so each region gets the same
/// store instance with its own statistics.
pub fn shared_store_manager(store: Arc<dyn CacheStore>) -> CacheManager {
    let factory: StoreFactory = Arc::new(move |_: &StoreOptions| -> IdCloudResult<Arc<dyn CacheStore>> {
        Ok(Arc::clone(&store))
    });
    let options = CacheOptions::default().with_store(StoreSpec::Factory(factory));
    let mut manager = CacheManager::new();
    for region in Region::ALL {
        manager
            .create_cache(region, &options)
            .expect("factory store never fails");
    }
    manager
}

// ============================================================================
// MANUAL CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.0.lock().expect("clock lock");
        *now += TimeDelta::seconds(secs);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock lock")
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for hrefs and resource payloads.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map};

    pub fn arb_region() -> impl Strategy<Value = Region> {
        prop::sample::select(Region::ALL.to_vec())
    }

    pub fn arb_resource_id() -> impl Strategy<Value = String> {
        "[A-Za-z0-9]{8,22}"
    }

    /// An absolute href in a collection region (never custom data).
    pub fn arb_href() -> impl Strategy<Value = String> {
        (arb_region(), arb_resource_id())
            .prop_filter("custom data hrefs are nested", |(region, _)| {
                *region != Region::CustomData
            })
            .prop_map(|(region, id)| format!("{}/{}/{}", fixtures::BASE_URL, region, id))
    }

    /// Plain property values: strings, numbers, booleans and null.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[a-z ]{0,16}".prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            Just(Value::Null),
        ]
    }

    /// Property names; never `href`.
    pub fn arb_property_name() -> impl Strategy<Value = String> {
        "[a-gi-z][a-z]{2,7}"
    }

    /// A resource object with an href and a few scalar properties.
    pub fn arb_flat_resource() -> impl Strategy<Value = Value> {
        (arb_href(), prop::collection::btree_map(arb_property_name(), arb_scalar(), 1..4)).prop_map(
            |(href, props)| {
                let mut obj: Map<String, Value> = props.into_iter().collect();
                obj.insert("href".to_string(), json!(href));
                Value::Object(obj)
            },
        )
    }

    /// A resource whose fields may hold expanded resources, up to `depth` levels.
    pub fn arb_nested_resource(depth: u32) -> impl Strategy<Value = Value> {
        arb_flat_resource().prop_recursive(depth, 16, 3, |inner| {
            (
                arb_flat_resource(),
                prop::collection::btree_map(arb_property_name().prop_map(|name| name + "Ref"), inner, 1..3),
            )
                .prop_map(|(parent, children)| {
                    let mut obj = parent.as_object().cloned().unwrap_or_default();
                    obj.extend(children);
                    Value::Object(obj)
                })
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built payloads and data stores.

    use super::*;
    use serde_json::json;

    pub const BASE_URL: &str = "https://api.idcloud.example/v1";

    pub fn href(path: &str) -> String {
        format!("{}{}", BASE_URL, path)
    }

    pub fn account_json(id: &str) -> Value {
        json!({
            "href": href(&format!("/accounts/{id}")),
            "email": format!("{id}@example.com"),
            "givenName": "Test",
            "surname": "Account",
            "status": "ENABLED",
            "directory": {"href": href("/directories/dir1")},
            "customData": {"href": href(&format!("/accounts/{id}/customData"))}
        })
    }

    pub fn directory_json(id: &str) -> Value {
        json!({
            "href": href(&format!("/directories/{id}")),
            "name": format!("Directory {id}"),
            "status": "ENABLED"
        })
    }

    /// A collection page of `count` accounts starting at `offset`.
    pub fn accounts_page(collection_href: &str, offset: u64, limit: u64, size: u64) -> Value {
        let end = (offset + limit).min(size);
        let items: Vec<Value> = (offset..end)
            .map(|n| account_json(&format!("acct{n}")))
            .collect();
        json!({
            "href": collection_href,
            "offset": offset,
            "limit": limit,
            "size": size,
            "items": items
        })
    }

    /// A data store over `executor` with default in-memory caches.
    pub fn data_store(executor: Arc<dyn RequestExecutor>) -> DataStore {
        DataStore::builder()
            .request_executor(executor)
            .build()
            .expect("default data store")
    }

    /// A data store over `executor` whose caches all use `store`.
    pub fn data_store_with_cache_store(
        executor: Arc<dyn RequestExecutor>,
        store: Arc<dyn CacheStore>,
    ) -> DataStore {
        DataStore::builder()
            .request_executor(executor)
            .cache_manager(shared_store_manager(store))
            .build()
            .expect("data store")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_stub_executor_replays_in_order() {
        let executor = StubRequestExecutor::new();
        executor
            .respond(Method::Get, "/a", json!(1))
            .respond(Method::Get, "/a", json!(2));

        let first = executor.execute(RequestDescriptor::get("/a")).await;
        let second = executor.execute(RequestDescriptor::get("/a")).await;
        let third = executor.execute(RequestDescriptor::get("/a")).await;
        assert_eq!(first, Ok(Some(json!(1))));
        assert_eq!(second, Ok(Some(json!(2))));
        assert_eq!(third, Ok(Some(json!(2))));
        assert_eq!(executor.call_count(Method::Get, "/a"), 3);

        let missing = executor.execute(RequestDescriptor::get("/b")).await;
        assert_eq!(missing.expect_err("unscripted").remote().map(|e| e.status), Some(404));
    }

    #[tokio::test]
    async fn test_recording_store_logs_and_fails() {
        let store = RecordingStore::new(EventLog::new());
        let entry = CacheEntry::new(json!({"href": "/x"}));
        store.set("/x", entry).await.expect("set");
        assert!(store.get("/x").await.expect("get").is_some());

        store.set_fail_reads(true);
        assert!(store.get("/x").await.is_err());
        assert_eq!(store.log().entries(), vec!["cache:set /x", "cache:get /x", "cache:get /x"]);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::default();
        let start = clock.now();
        clock.advance_secs(30);
        assert_eq!((clock.now() - start).num_seconds(), 30);
    }

    proptest! {
        #[test]
        fn prop_generated_hrefs_route_to_a_region(href in generators::arb_href()) {
            prop_assert!(Region::for_href(&href).is_some());
        }

        #[test]
        fn prop_nested_resources_have_hrefs(value in generators::arb_nested_resource(3)) {
            prop_assert!(value.get("href").and_then(Value::as_str).is_some());
        }
    }
}
