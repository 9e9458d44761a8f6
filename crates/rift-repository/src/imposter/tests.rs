//! Tests for the imposter module.
//!
//! Cross-component scenarios: ImposterRepository lifecycle, shared stub
//! lists, response rotation under load and write-through failures.

use super::*;
use crate::backends::InMemoryDocumentStore;
use crate::config::StoreConfig;
use crate::error::{RepositoryError, RepositoryResult};
use crate::metrics::MATCHES_DROPPED_TOTAL;
use crate::store::{DocumentStore, KeyFilter};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

// ============================================================================
// Fixtures
// ============================================================================

/// In-memory store whose writes can be switched off and whose inserts can
/// be held until the test releases them
struct ControlledStore {
    inner: InMemoryDocumentStore,
    fail_writes: AtomicBool,
    gate_inserts: AtomicBool,
    insert_entered: Notify,
    insert_released: Notify,
}

impl ControlledStore {
    fn new() -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            fail_writes: AtomicBool::new(false),
            gate_inserts: AtomicBool::new(false),
            insert_entered: Notify::new(),
            insert_released: Notify::new(),
        }
    }

    fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn gate_inserts(&self) {
        self.gate_inserts.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> RepositoryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database("write refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for ControlledStore {
    async fn connect(&self) -> RepositoryResult<()> {
        self.inner.connect().await
    }

    async fn close(&self) -> RepositoryResult<()> {
        self.inner.close().await
    }

    async fn insert_one(&self, port: u16, document: Value) -> RepositoryResult<()> {
        if self.gate_inserts.load(Ordering::SeqCst) {
            self.insert_entered.notify_one();
            self.insert_released.notified().await;
        }
        self.inner.insert_one(port, document).await
    }

    async fn find_one(&self, filter: KeyFilter) -> RepositoryResult<Option<Value>> {
        self.inner.find_one(filter).await
    }

    async fn find(&self, filter: KeyFilter) -> RepositoryResult<Vec<Value>> {
        self.inner.find(filter).await
    }

    async fn find_one_and_delete(&self, filter: KeyFilter) -> RepositoryResult<Option<Value>> {
        self.inner.find_one_and_delete(filter).await
    }

    async fn delete_many(&self, filter: KeyFilter) -> RepositoryResult<u64> {
        self.inner.delete_many(filter).await
    }

    async fn replace_one(&self, port: u16, document: Value) -> RepositoryResult<bool> {
        self.check()?;
        self.inner.replace_one(port, document).await
    }

    async fn create_collection(&self) -> RepositoryResult<()> {
        self.inner.create_collection().await
    }

    async fn drop_collection(&self) -> RepositoryResult<()> {
        self.inner.drop_collection().await
    }
}

struct CountingHandler(AtomicUsize);

impl CountingHandler {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShutdownHandler for CountingHandler {
    async fn shutdown(&self, _port: u16, _args: &Value) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn repository_with(
    persist_requests: bool,
) -> (ImposterRepository, Arc<InMemoryDocumentStore>) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let repository =
        ImposterRepository::new(store.clone(), Arc::new(ActionRegistry::new()), persist_requests);
    repository.connect().await.unwrap();
    (repository, store)
}

async fn repository() -> ImposterRepository {
    repository_with(false).await.0
}

fn response(v: u64) -> ResponseConfig {
    ResponseConfig::is(json!({ "v": v }))
}

fn value_of(response: &ResponseConfig) -> u64 {
    response.is_response().unwrap()["v"].as_u64().unwrap()
}

fn any_stub(_: &[Value]) -> bool {
    true
}

fn recorded_proxy_response(body: &str) -> ResponseConfig {
    ResponseConfig::is(json!({"body": body, "_proxyResponseTime": 7}))
}

// ============================================================================
// Response rotation
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_counts_are_exact() {
    let repo_owner = repository().await;
    let responses: Vec<_> = (0..10).map(response).collect();
    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(vec![Stub::with_responses(responses)]))
        .await
        .unwrap();
    let stubs = repo_owner.stubs_for(4545).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..100 {
        let stubs = stubs.clone();
        handles.push(tokio::spawn(async move {
            let found = stubs.first(any_stub, 0).await;
            let next = found.stub.next_response();
            found
                .stub
                .record_match(json!({}), json!({}), next.config.clone(), 1)
                .await;
            value_of(&next.config)
        }));
    }

    let mut counts: HashMap<u64, usize> = HashMap::new();
    for handle in handles {
        *counts.entry(handle.await.unwrap()).or_default() += 1;
    }

    assert_eq!(counts.len(), 10);
    for v in 0..10 {
        assert_eq!(counts[&v], 10, "value {v} served {} times", counts[&v]);
    }

    let stored = repo_owner.get(4545).await.unwrap().unwrap();
    assert_eq!(stored.stubs[0].matches.len(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_honors_repeat_counts() {
    let repo_owner = repository().await;
    let stub = Stub::with_responses(vec![response(0), response(1).with_repeat(2)]);
    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(vec![stub]))
        .await
        .unwrap();
    let entry = repo_owner.stubs_for(4545).await.unwrap().get(0).await.unwrap();

    let handles: Vec<_> = (0..300)
        .map(|_| {
            let entry = entry.clone();
            tokio::spawn(async move { value_of(&entry.next_response().config) })
        })
        .collect();

    let mut counts: HashMap<u64, usize> = HashMap::new();
    for handle in handles {
        *counts.entry(handle.await.unwrap()).or_default() += 1;
    }
    assert_eq!(counts[&0], 100);
    assert_eq!(counts[&1], 200);
}

#[tokio::test]
async fn test_repeat_expansion_order() {
    let repo_owner = repository().await;
    let stub = Stub::with_responses(vec![response(0), response(1).with_repeat(2)]);
    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(vec![stub]))
        .await
        .unwrap();
    let stubs = repo_owner.stubs_for(4545).await.unwrap();
    let entry = stubs.first(any_stub, 0).await.stub;

    let order: Vec<_> = (0..6)
        .map(|_| value_of(&entry.next_response().config))
        .collect();
    assert_eq!(order, vec![0, 1, 1, 0, 1, 1]);
    assert_eq!(order.iter().filter(|v| **v == 0).count(), 2);
    assert_eq!(order.iter().filter(|v| **v == 1).count(), 4);
}

#[tokio::test]
async fn test_stub_handles_share_rotation_state() {
    let repo_owner = repository().await;
    repo_owner
        .add(
            Imposter::new(4545, "http")
                .with_stubs(vec![Stub::with_responses(vec![response(0), response(1)])]),
        )
        .await
        .unwrap();

    let first = repo_owner.stubs_for(4545).await.unwrap();
    let second = repo_owner.stubs_for(4545).await.unwrap();

    let a = first.first(any_stub, 0).await.stub.next_response();
    let b = second.first(any_stub, 0).await.stub.next_response();
    assert_eq!((value_of(&a.config), value_of(&b.config)), (0, 1));
}

#[tokio::test]
async fn test_added_response_persists_and_rotates_once() {
    let repo_owner = repository().await;
    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(vec![Stub::with_responses(vec![response(0)])]))
        .await
        .unwrap();
    let stubs = repo_owner.stubs_for(4545).await.unwrap();
    let entry = stubs.get(0).await.unwrap();

    entry.add_response(response(1).with_repeat(4)).await.unwrap();

    let order: Vec<_> = (0..4)
        .map(|_| value_of(&entry.next_response().config))
        .collect();
    assert_eq!(order, vec![0, 1, 0, 1]);

    let stored = repo_owner.get(4545).await.unwrap().unwrap();
    assert_eq!(stored.stubs[0].responses.len(), 2);
    assert_eq!(stored.stubs[0].responses[1].repeat, Some(4));
}

// ============================================================================
// Stub list
// ============================================================================

#[tokio::test]
async fn test_reindex_after_mixed_operations() {
    let repo_owner = repository().await;
    repo_owner.add(Imposter::new(4545, "http")).await.unwrap();
    let stubs = repo_owner.stubs_for(4545).await.unwrap();

    for v in 0..5 {
        stubs.add(Stub::with_responses(vec![response(v)])).await.unwrap();
    }
    stubs.delete_at_index(1).await.unwrap();
    stubs
        .insert_at_index(Stub::with_responses(vec![response(9)]), 0)
        .await
        .unwrap();
    stubs
        .overwrite_at_index(Stub::with_responses(vec![response(8)]), 3)
        .await
        .unwrap();

    let len = stubs.len().await;
    assert_eq!(len, 5);
    for i in 0..len {
        let entry = stubs.get(i).await.unwrap();
        assert_eq!(entry.index().get(), Some(i));
        assert_eq!(entry.next_response().stub_index(), Some(i));
    }

    let stored = repo_owner.get(4545).await.unwrap().unwrap();
    let values: Vec<_> = stored
        .stubs
        .iter()
        .map(|s| value_of(&s.responses[0]))
        .collect();
    assert_eq!(values, vec![9, 0, 2, 8, 4]);
}

#[tokio::test]
async fn test_round_trip_with_and_without_debug() {
    let repo_owner = repository().await;
    let original = vec![
        Stub::new(vec![json!({"equals": {"path": "/a"}})], vec![response(0)]),
        Stub::new(vec![json!({"exists": {"body": true}})], vec![response(1), response(2)]),
    ];
    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(original.clone()))
        .await
        .unwrap();
    let stubs = repo_owner.stubs_for(4545).await.unwrap();

    let entry = stubs.get(1).await.unwrap();
    let next = entry.next_response();
    entry
        .record_match(json!({"path": "/b"}), json!({"statusCode": 200}), next.config, 3)
        .await;

    let plain = stubs.to_json(SnapshotOptions::default()).await;
    assert_eq!(plain, original);

    let debug = stubs.to_json(SnapshotOptions::debug()).await;
    assert_eq!(debug[1].matches.len(), 1);

    repo_owner.add(Imposter::new(4546, "http")).await.unwrap();
    let copy = repo_owner.stubs_for(4546).await.unwrap();
    copy.overwrite_all(debug.clone()).await.unwrap();
    assert_eq!(copy.to_json(SnapshotOptions::debug()).await, debug);
    assert_eq!(copy.to_json(SnapshotOptions::default()).await, original);
}

#[tokio::test]
async fn test_delete_saved_proxy_responses() {
    let repo_owner = repository().await;
    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(vec![
            Stub::with_responses(vec![response(0), recorded_proxy_response("captured")]),
            Stub::with_responses(vec![recorded_proxy_response("only")]),
            Stub::with_responses(vec![response(1)]),
        ]))
        .await
        .unwrap();
    let stubs = repo_owner.stubs_for(4545).await.unwrap();

    stubs.delete_saved_proxy_responses().await.unwrap();

    let expected = vec![
        Stub::with_responses(vec![response(0)]),
        Stub::with_responses(vec![response(1)]),
    ];
    assert_eq!(stubs.to_json(SnapshotOptions::default()).await, expected);
    assert_eq!(stubs.get(1).await.unwrap().index().get(), Some(1));
    assert_eq!(repo_owner.get(4545).await.unwrap().unwrap().stubs, expected);
}

// ============================================================================
// Write-through failures
// ============================================================================

#[tokio::test]
async fn test_failed_flush_leaves_stubs_unchanged() {
    let store = Arc::new(ControlledStore::new());
    let repo_owner =
        ImposterRepository::new(store.clone(), Arc::new(ActionRegistry::new()), false);
    repo_owner.connect().await.unwrap();
    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(vec![Stub::with_responses(vec![response(0)])]))
        .await
        .unwrap();
    let stubs = repo_owner.stubs_for(4545).await.unwrap();
    let before = stubs.to_json(SnapshotOptions::debug()).await;

    store.fail_writes(true);
    let err = stubs
        .add(Stub::with_responses(vec![response(1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Database(_)));
    assert!(stubs.delete_at_index(0).await.is_err());
    assert!(stubs.overwrite_all(Vec::new()).await.is_err());

    assert_eq!(stubs.to_json(SnapshotOptions::debug()).await, before);
    assert_eq!(stubs.get(0).await.unwrap().index().get(), Some(0));
}

#[tokio::test]
async fn test_failed_match_write_is_not_an_error() {
    let store = Arc::new(ControlledStore::new());
    let repo_owner =
        ImposterRepository::new(store.clone(), Arc::new(ActionRegistry::new()), false);
    repo_owner.connect().await.unwrap();
    repo_owner
        .add(Imposter::new(5757, "http").with_stubs(vec![Stub::with_responses(vec![response(0)])]))
        .await
        .unwrap();
    let entry = repo_owner.stubs_for(5757).await.unwrap().get(0).await.unwrap();
    let dropped_before = MATCHES_DROPPED_TOTAL.with_label_values(&["5757"]).get();

    store.fail_writes(true);
    let next = entry.next_response();
    entry.record_match(json!({}), json!({}), next.config, 1).await;

    assert_eq!(entry.matches_count(), 1);
    assert_eq!(
        MATCHES_DROPPED_TOTAL.with_label_values(&["5757"]).get(),
        dropped_before + 1.0
    );
    assert!(entry.add_response(response(1)).await.is_err());
}

// ============================================================================
// ImposterRepository
// ============================================================================

#[tokio::test]
async fn test_add_get_exists() {
    let repo_owner = repository().await;
    assert!(!repo_owner.exists(4545).await.unwrap());

    let added = repo_owner.add(Imposter::new(4545, "tcp")).await.unwrap();
    assert!(added.stubs.is_empty());
    assert!(repo_owner.exists(4545).await.unwrap());
    assert_eq!(repo_owner.get(4545).await.unwrap(), Some(added));
    assert_eq!(repo_owner.get(4546).await.unwrap(), None);
}

#[tokio::test]
async fn test_add_duplicate_port() {
    let repo_owner = repository().await;
    repo_owner.add(Imposter::new(4545, "http")).await.unwrap();
    let err = repo_owner.add(Imposter::new(4545, "http")).await.unwrap_err();
    assert!(err.is_duplicate_key());
}

#[tokio::test]
async fn test_all_is_port_ordered() {
    let repo_owner = repository().await;
    for port in [4547, 4545, 4546] {
        repo_owner.add(Imposter::new(port, "http")).await.unwrap();
    }
    let ports: Vec<_> = repo_owner
        .all()
        .await
        .unwrap()
        .iter()
        .map(|i| i.port)
        .collect();
    assert_eq!(ports, vec![4545, 4546, 4547]);
    assert_eq!(repo_owner.load_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_del_absent_imposter_returns_none() {
    let repo_owner = repository().await;
    assert!(repo_owner.del(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_missing_and_existing() {
    let repo_owner = repository().await;
    let err = repo_owner
        .update(&Imposter::new(4545, "http"))
        .await
        .unwrap_err();
    assert!(err.is_missing_resource());

    repo_owner.add(Imposter::new(4545, "http")).await.unwrap();
    let stubs = repo_owner.stubs_for(4545).await.unwrap();
    assert!(stubs.is_empty().await);

    let mut changed = Imposter::new(4545, "http");
    changed.stubs = vec![Stub::with_responses(vec![response(3)])];
    repo_owner.update(&changed).await.unwrap();

    assert_eq!(stubs.len().await, 1);
    let entry = stubs.first(any_stub, 0).await.stub;
    assert_eq!(value_of(&entry.next_response().config), 3);
}

#[tokio::test]
async fn test_add_adopts_stubs_added_before_persisting() {
    let repo_owner = repository().await;
    let pending = repo_owner.stubs_for(4545).await.unwrap();
    pending
        .add(Stub::with_responses(vec![response(0)]))
        .await
        .unwrap();
    assert!(!repo_owner.exists(4545).await.unwrap());

    let added = repo_owner.add(Imposter::new(4545, "http")).await.unwrap();
    assert_eq!(added.stubs.len(), 1);

    pending
        .add(Stub::with_responses(vec![response(1)]))
        .await
        .unwrap();
    let stored = repo_owner.get(4545).await.unwrap().unwrap();
    assert_eq!(stored.stubs.len(), 2);
}

#[tokio::test]
async fn test_add_with_stubs_replaces_pending_list() {
    let repo_owner = repository().await;
    let pending = repo_owner.stubs_for(4545).await.unwrap();
    pending
        .add(Stub::with_responses(vec![response(0)]))
        .await
        .unwrap();

    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(vec![Stub::with_responses(vec![response(7)])]))
        .await
        .unwrap();

    let live = repo_owner.stubs_for(4545).await.unwrap();
    let entry = live.first(any_stub, 0).await.stub;
    assert_eq!(value_of(&entry.next_response().config), 7);
}

#[tokio::test]
async fn test_dropped_stub_list_cannot_overwrite_new_imposter() {
    let repo_owner = repository().await;
    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(vec![Stub::with_responses(vec![response(1)])]))
        .await
        .unwrap();
    let stale = repo_owner.stubs_for(4545).await.unwrap();

    repo_owner.del(4545).await.unwrap();
    assert!(stale.is_retired());
    repo_owner
        .add(Imposter::new(4545, "http").with_stubs(vec![Stub::with_responses(vec![response(7)])]))
        .await
        .unwrap();

    let err = stale
        .add(Stub::with_responses(vec![response(2)]))
        .await
        .unwrap_err();
    assert!(err.is_missing_resource());
    assert!(stale.add_request(json!({})).await.unwrap_err().is_missing_resource());
    assert!(stale.delete_saved_proxy_responses().await.is_err());

    let stored = repo_owner.get(4545).await.unwrap().unwrap();
    let stored_values: Vec<_> = stored.stubs.iter().map(|s| value_of(&s.responses[0])).collect();
    assert_eq!(stored_values, vec![7]);

    let live = repo_owner.stubs_for(4545).await.unwrap();
    assert!(!live.is_retired());
    let entry = live.first(any_stub, 0).await.stub;
    assert_eq!(value_of(&entry.next_response().config), 7);
}

#[tokio::test]
async fn test_stub_list_retired_by_stop_all_and_delete_all() {
    let repo_owner = repository().await;
    repo_owner.add(Imposter::new(4545, "http")).await.unwrap();

    let before_stop = repo_owner.stubs_for(4545).await.unwrap();
    repo_owner.stop_all().await.unwrap();
    assert!(before_stop.is_retired());
    assert!(before_stop.add(Stub::default()).await.is_err());

    let before_delete = repo_owner.stubs_for(4545).await.unwrap();
    repo_owner.delete_all().await.unwrap();
    assert!(before_delete.is_retired());
    assert!(before_delete.delete_saved_requests().await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stub_added_while_adopting_insert_is_persisted() {
    let store = Arc::new(ControlledStore::new());
    let repo_owner = Arc::new(ImposterRepository::new(
        store.clone(),
        Arc::new(ActionRegistry::new()),
        false,
    ));
    repo_owner.connect().await.unwrap();

    let pending = repo_owner.stubs_for(4545).await.unwrap();
    pending
        .add(Stub::with_responses(vec![response(0)]))
        .await
        .unwrap();

    store.gate_inserts();
    let adding = tokio::spawn({
        let repo_owner = repo_owner.clone();
        async move { repo_owner.add(Imposter::new(4545, "http")).await }
    });
    store.insert_entered.notified().await;

    let late = tokio::spawn({
        let pending = pending.clone();
        async move { pending.add(Stub::with_responses(vec![response(1)])).await }
    });
    tokio::task::yield_now().await;
    store.insert_released.notify_one();

    adding.await.unwrap().unwrap();
    late.await.unwrap().unwrap();

    let stored = repo_owner.get(4545).await.unwrap().unwrap();
    let values: Vec<_> = stored.stubs.iter().map(|s| value_of(&s.responses[0])).collect();
    assert_eq!(values, vec![0, 1]);
}

#[tokio::test]
async fn test_persisted_requests_survive_reload() {
    let (repo_owner, store) = repository_with(true).await;
    repo_owner.add(Imposter::new(4545, "http")).await.unwrap();
    let stubs = repo_owner.stubs_for(4545).await.unwrap();
    stubs.add_request(json!({"path": "/orders"})).await.unwrap();

    let stored = repo_owner.get(4545).await.unwrap().unwrap();
    assert_eq!(stored.requests, vec![json!({"path": "/orders"})]);

    let restarted = ImposterRepository::new(store, Arc::new(ActionRegistry::new()), true);
    let reloaded = restarted.stubs_for(4545).await.unwrap();
    assert_eq!(reloaded.load_requests(), vec![json!({"path": "/orders"})]);

    reloaded.delete_saved_requests().await.unwrap();
    assert!(restarted.get(4545).await.unwrap().unwrap().requests.is_empty());
}

// ============================================================================
// Shutdown actions
// ============================================================================

async fn repository_with_listener() -> (ImposterRepository, Arc<CountingHandler>) {
    let repo_owner = repository().await;
    let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
    repo_owner.actions().register("listener", handler.clone());
    for port in [4545, 4546] {
        repo_owner
            .add(Imposter::new(port, "http").with_stop(ShutdownAction::new("listener")))
            .await
            .unwrap();
    }
    (repo_owner, handler)
}

#[tokio::test]
async fn test_del_invokes_and_strips_stop_action() {
    let (repo_owner, handler) = repository_with_listener().await;

    let removed = repo_owner.del(4545).await.unwrap().unwrap();
    assert!(removed.stop.is_none());
    assert_eq!(handler.count(), 1);
    assert!(!repo_owner.exists(4545).await.unwrap());
}

#[tokio::test]
async fn test_delete_all_stops_then_deletes() {
    let (repo_owner, handler) = repository_with_listener().await;
    repo_owner
        .add(Imposter::new(4547, "http").with_stop(ShutdownAction::new("unregistered")))
        .await
        .unwrap();

    repo_owner.delete_all().await.unwrap();
    assert_eq!(handler.count(), 2);
    assert!(repo_owner.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_all_keeps_documents() {
    let (repo_owner, handler) = repository_with_listener().await;
    let before = repo_owner.stubs_for(4545).await.unwrap();

    repo_owner.stop_all().await.unwrap();
    assert_eq!(handler.count(), 2);
    assert_eq!(repo_owner.load_all().await.unwrap().len(), 2);

    let after = repo_owner.stubs_for(4545).await.unwrap();
    after
        .add(Stub::with_responses(vec![response(0)]))
        .await
        .unwrap();
    assert!(before.is_empty().await);
}

#[tokio::test]
async fn test_delete_all_and_close_releases_store() {
    let (repo_owner, store) = repository_with(false).await;
    repo_owner.add(Imposter::new(4545, "http")).await.unwrap();

    repo_owner.delete_all_and_close().await.unwrap();
    assert!(!store.is_connected());
    assert!(store.find(KeyFilter::All).await.is_err());
}

#[tokio::test]
async fn test_delete_all_then_runs_after_bulk_delete() {
    let (repo_owner, store) = repository_with(false).await;
    repo_owner.add(Imposter::new(4545, "http")).await.unwrap();

    let remaining = Arc::new(AtomicUsize::new(usize::MAX));
    repo_owner
        .delete_all_then(|| {
            let remaining = remaining.clone();
            let store = store.clone();
            async move {
                let left = store.find(KeyFilter::All).await.unwrap().len();
                remaining.store(left, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

    assert_eq!(remaining.load(Ordering::SeqCst), 0);
    assert!(store.is_connected());
}

#[tokio::test]
async fn test_migrate_and_teardown_inmemory() {
    let config = StoreConfig::default();
    ImposterRepository::migrate(&config).await.unwrap();
    ImposterRepository::teardown(&config).await.unwrap();
}
