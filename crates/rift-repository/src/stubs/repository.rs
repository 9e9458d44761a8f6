//! Ordered, write-through stub list for one imposter.
//!
//! Every structural change is applied to a copy of the list, flushed to the
//! document store, and only then committed and reindexed. A failed flush
//! leaves the in-memory list exactly as it was.
//!
//! A list dropped by its imposter repository is retired: it keeps serving
//! reads but refuses every write, so it can never touch a document that was
//! later stored on the same port.

use super::entry::StubEntry;
use crate::error::{RepositoryError, RepositoryResult};
use crate::imposter::document::ImposterWriter;
use crate::imposter::{Imposter, SnapshotOptions, Stub};
use crate::metrics;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::debug;

/// State shared by every handle to one imposter's stub list
pub(crate) struct Shared {
    port: u16,
    writer: ImposterWriter,
    persist_requests: bool,
    me: Weak<Shared>,
    /// Held across the flush of a structural change
    stubs: tokio::sync::Mutex<Vec<Arc<StubEntry>>>,
    requests: Mutex<Vec<Value>>,
    /// Set once the owning repository drops this list
    retired: AtomicBool,
}

impl Shared {
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    fn wrap(&self, stub: Stub) -> Arc<StubEntry> {
        StubEntry::new(stub, self.me.clone())
    }

    fn ensure_live(&self) -> RepositoryResult<()> {
        if self.retired.load(Ordering::SeqCst) {
            return Err(RepositoryError::MissingResource(format!(
                "stubs for imposter on port {} were removed",
                self.port
            )));
        }
        Ok(())
    }

    /// Flush the committed list, serialized with structural changes
    pub(crate) async fn flush_current(&self, trigger: &str) -> RepositoryResult<()> {
        let stubs = self.stubs.lock().await;
        self.ensure_live()?;
        self.flush(&stubs, trigger).await
    }

    async fn flush(&self, entries: &[Arc<StubEntry>], trigger: &str) -> RepositoryResult<()> {
        let start = Instant::now();
        let stubs = entries.iter().map(|entry| entry.snapshot(true)).collect();
        let requests = self.persist_requests.then(|| self.requests.lock().clone());

        let result = self.writer.write_stubs(self.port, stubs, requests).await;
        metrics::record_flush(trigger, start.elapsed().as_secs_f64() * 1000.0, &result);
        result
    }
}

fn reindex(entries: &[Arc<StubEntry>]) {
    for (index, entry) in entries.iter().enumerate() {
        entry.set_index(index);
    }
}

/// Result of [`StubRepository::first`]
#[derive(Debug, Clone)]
pub struct StubMatch {
    pub matched: bool,
    /// The matching stub, or a detached empty stub when nothing matched
    pub stub: Arc<StubEntry>,
}

/// Handle to one imposter's stub list.
///
/// Handles are cheap to clone and all clones for a port see the same list
/// and the same rotation state.
#[derive(Clone)]
pub struct StubRepository {
    shared: Arc<Shared>,
}

impl StubRepository {
    pub(crate) fn new(
        port: u16,
        writer: ImposterWriter,
        persist_requests: bool,
        stubs: Vec<Stub>,
        requests: Vec<Value>,
    ) -> Self {
        let shared = Arc::new_cyclic(|me: &Weak<Shared>| {
            let entries: Vec<_> = stubs
                .into_iter()
                .map(|stub| StubEntry::new(stub, me.clone()))
                .collect();
            reindex(&entries);
            Shared {
                port,
                writer,
                persist_requests,
                me: me.clone(),
                stubs: tokio::sync::Mutex::new(entries),
                requests: Mutex::new(requests),
                retired: AtomicBool::new(false),
            }
        });
        Self { shared }
    }

    pub fn port(&self) -> u16 {
        self.shared.port
    }

    /// Linear scan from `start_index` for the first stub whose predicates
    /// satisfy `filter`.
    pub async fn first<F>(&self, filter: F, start_index: usize) -> StubMatch
    where
        F: Fn(&[Value]) -> bool,
    {
        let stubs = self.shared.stubs.lock().await;
        if let Some(entry) = stubs
            .iter()
            .skip(start_index)
            .find(|entry| entry.satisfies(&filter))
        {
            return StubMatch {
                matched: true,
                stub: entry.clone(),
            };
        }
        StubMatch {
            matched: false,
            stub: StubEntry::detached(Stub::default()),
        }
    }

    /// Append a stub
    pub async fn add(&self, stub: Stub) -> RepositoryResult<()> {
        let entry = self.shared.wrap(stub);
        self.mutate(move |stubs| {
            stubs.push(entry);
            Ok(())
        })
        .await
    }

    /// Insert a stub before `index`; an index past the end appends
    pub async fn insert_at_index(&self, stub: Stub, index: usize) -> RepositoryResult<()> {
        let entry = self.shared.wrap(stub);
        self.mutate(move |stubs| {
            let index = index.min(stubs.len());
            stubs.insert(index, entry);
            Ok(())
        })
        .await
    }

    /// Replace the whole list
    pub async fn overwrite_all(&self, new_stubs: Vec<Stub>) -> RepositoryResult<()> {
        let entries: Vec<_> = new_stubs
            .into_iter()
            .map(|stub| self.shared.wrap(stub))
            .collect();
        self.mutate(move |stubs| {
            *stubs = entries;
            Ok(())
        })
        .await
    }

    pub async fn overwrite_at_index(&self, new_stub: Stub, index: usize) -> RepositoryResult<()> {
        let entry = self.shared.wrap(new_stub);
        self.mutate(move |stubs| {
            let slot = stubs
                .get_mut(index)
                .ok_or_else(|| RepositoryError::missing_stub(index))?;
            *slot = entry;
            Ok(())
        })
        .await
    }

    pub async fn delete_at_index(&self, index: usize) -> RepositoryResult<()> {
        self.mutate(move |stubs| {
            if index >= stubs.len() {
                return Err(RepositoryError::missing_stub(index));
            }
            stubs.remove(index);
            Ok(())
        })
        .await
    }

    /// Snapshot of every stub; `matches` only with `options.debug`
    pub async fn to_json(&self, options: SnapshotOptions) -> Vec<Stub> {
        let stubs = self.shared.stubs.lock().await;
        stubs
            .iter()
            .map(|entry| entry.snapshot(options.debug))
            .collect()
    }

    /// Remove responses captured by a recording proxy, dropping stubs that
    /// end up with no responses at all.
    pub async fn delete_saved_proxy_responses(&self) -> RepositoryResult<()> {
        let shared = self.shared.clone();
        self.mutate(move |stubs| {
            let mut kept = Vec::with_capacity(stubs.len());
            for entry in stubs.drain(..) {
                let mut stub = entry.snapshot(true);
                let before = stub.responses.len();
                stub.responses.retain(|r| !r.is_recorded_proxy_response());

                if stub.responses.len() == before {
                    kept.push(entry);
                } else if !stub.responses.is_empty() {
                    kept.push(shared.wrap(stub));
                }
            }
            *stubs = kept;
            Ok(())
        })
        .await
    }

    /// Append to the request log
    pub async fn add_request(&self, request: Value) -> RepositoryResult<()> {
        self.shared.ensure_live()?;
        self.shared.requests.lock().push(request);
        if self.shared.persist_requests {
            self.shared.flush_current("request").await?;
        }
        Ok(())
    }

    pub fn load_requests(&self) -> Vec<Value> {
        self.shared.requests.lock().clone()
    }

    pub async fn delete_saved_requests(&self) -> RepositoryResult<()> {
        self.shared.ensure_live()?;
        self.shared.requests.lock().clear();
        if self.shared.persist_requests {
            self.shared.flush_current("request").await?;
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.shared.stubs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stub at `index`, if any
    pub async fn get(&self, index: usize) -> Option<Arc<StubEntry>> {
        self.shared.stubs.lock().await.get(index).cloned()
    }

    /// Replace the in-memory list with stubs that are already persisted
    pub(crate) async fn reload(&self, stubs: Vec<Stub>, requests: Option<Vec<Value>>) {
        let entries: Vec<_> = stubs
            .into_iter()
            .map(|stub| self.shared.wrap(stub))
            .collect();
        reindex(&entries);

        let mut current = self.shared.stubs.lock().await;
        for entry in current.iter() {
            entry.detach();
        }
        *current = entries;
        if let Some(requests) = requests {
            *self.shared.requests.lock() = requests;
        }
        debug!(port = self.shared.port, stubs = current.len(), "Reloaded stub list");
    }

    /// Store `imposter` as a new document carrying this list.
    ///
    /// Structural changes wait until the insert finishes, so none of them
    /// can land in the window where the document does not exist yet.
    pub(crate) async fn insert_with(&self, imposter: &mut Imposter) -> RepositoryResult<()> {
        let stubs = self.shared.stubs.lock().await;
        self.shared.ensure_live()?;
        imposter.stubs = stubs.iter().map(|entry| entry.snapshot(true)).collect();
        if self.shared.persist_requests {
            imposter.requests = self.shared.requests.lock().clone();
        }
        self.shared.writer.insert(imposter).await
    }

    /// Retire the list and detach every stub
    pub(crate) async fn detach_all(&self) {
        let stubs = self.shared.stubs.lock().await;
        self.shared.retired.store(true, Ordering::SeqCst);
        for entry in stubs.iter() {
            entry.detach();
        }
    }

    pub fn is_retired(&self) -> bool {
        self.shared.retired.load(Ordering::SeqCst)
    }

    /// Apply `change` to a copy of the list, flush it, then commit.
    async fn mutate<F>(&self, change: F) -> RepositoryResult<()>
    where
        F: FnOnce(&mut Vec<Arc<StubEntry>>) -> RepositoryResult<()>,
    {
        let mut current = self.shared.stubs.lock().await;
        self.shared.ensure_live()?;
        let mut next = current.clone();
        change(&mut next)?;
        self.shared.flush(&next, "structural").await?;

        for entry in current.iter() {
            if !next.iter().any(|kept| Arc::ptr_eq(kept, entry)) {
                entry.detach();
            }
        }
        reindex(&next);
        *current = next;
        debug!(port = self.shared.port, stubs = current.len(), "Stub list updated");
        Ok(())
    }
}

impl fmt::Debug for StubRepository {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StubRepository")
            .field("port", &self.shared.port)
            .field("persist_requests", &self.shared.persist_requests)
            .finish()
    }
}
