//! A single stub held by a stub repository.
//!
//! The entry owns the stub's rotation queue and match trail. Rotation is
//! synchronous and guarded by a per-entry lock so that concurrent callers
//! each consume exactly one slot.

use super::repository::Shared;
use super::sequencer::ResponseSequencer;
use crate::error::RepositoryResult;
use crate::imposter::{Match, ResponseConfig, Stub};
use crate::metrics;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

const DETACHED: usize = usize::MAX;

/// Live position of a stub within its repository.
///
/// Clones share the same slot, so an index handed out with a response keeps
/// tracking the stub as the list is reordered. A stub that was removed, or
/// that never belonged to a list, reports `None`.
#[derive(Clone)]
pub struct StubIndex(Arc<AtomicUsize>);

impl StubIndex {
    pub(crate) fn detached() -> Self {
        Self(Arc::new(AtomicUsize::new(DETACHED)))
    }

    pub fn get(&self) -> Option<usize> {
        match self.0.load(Ordering::SeqCst) {
            DETACHED => None,
            index => Some(index),
        }
    }

    pub(crate) fn set(&self, index: usize) {
        self.0.store(index, Ordering::SeqCst);
    }

    pub(crate) fn detach(&self) {
        self.0.store(DETACHED, Ordering::SeqCst);
    }
}

impl fmt::Debug for StubIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.get() {
            Some(index) => write!(f, "StubIndex({index})"),
            None => f.write_str("StubIndex(detached)"),
        }
    }
}

/// Response chosen by a rotation, tagged with the stub that produced it
#[derive(Debug, Clone)]
pub struct NextResponse {
    pub config: ResponseConfig,
    pub stub_index: StubIndex,
}

impl NextResponse {
    /// Position to insert newly recorded proxy stubs before
    pub fn stub_index(&self) -> Option<usize> {
        self.stub_index.get()
    }
}

struct EntryState {
    stub: Stub,
    sequencer: ResponseSequencer,
}

pub struct StubEntry {
    index: StubIndex,
    state: Mutex<EntryState>,
    owner: Weak<Shared>,
}

impl StubEntry {
    pub(crate) fn new(stub: Stub, owner: Weak<Shared>) -> Arc<Self> {
        let sequencer = ResponseSequencer::new(&stub.responses);
        Arc::new(Self {
            index: StubIndex::detached(),
            state: Mutex::new(EntryState { stub, sequencer }),
            owner,
        })
    }

    /// Entry that belongs to no repository, returned when nothing matches
    pub(crate) fn detached(stub: Stub) -> Arc<Self> {
        Self::new(stub, Weak::new())
    }

    pub fn index(&self) -> StubIndex {
        self.index.clone()
    }

    pub(crate) fn set_index(&self, index: usize) {
        self.index.set(index);
    }

    pub(crate) fn detach(&self) {
        self.index.detach();
    }

    pub fn predicates(&self) -> Vec<Value> {
        self.state.lock().stub.predicates.clone()
    }

    pub fn scenario_name(&self) -> Option<String> {
        self.state.lock().stub.scenario_name.clone()
    }

    /// Evaluate a caller-supplied predicate filter against this stub
    pub fn satisfies<F>(&self, filter: F) -> bool
    where
        F: Fn(&[Value]) -> bool,
    {
        let state = self.state.lock();
        filter(&state.stub.predicates)
    }

    /// Rotate the queue and return its head.
    ///
    /// A stub with no responses answers `{"is": {}}` and keeps its state.
    pub fn next_response(&self) -> NextResponse {
        let rotated = self.state.lock().sequencer.rotate();
        metrics::record_response_served(rotated.is_some());
        NextResponse {
            config: rotated.unwrap_or_else(ResponseConfig::empty),
            stub_index: self.index(),
        }
    }

    /// Append one response to the stub and its rotation queue, then flush
    /// the owning imposter.
    ///
    /// The response takes exactly one rotation slot; its `repeat` is kept
    /// in the persisted config but not expanded.
    pub async fn add_response(&self, response: ResponseConfig) -> RepositoryResult<()> {
        {
            let mut state = self.state.lock();
            state.stub.responses.push(response.clone());
            state.sequencer.push(response);
        }

        let Some(owner) = self.attached_owner() else {
            debug!("Response added to a detached stub, not persisted");
            return Ok(());
        };
        let result = owner.flush_current("response").await;
        if let Err(e) = &result {
            warn!(port = owner.port(), index = ?self.index.get(), "Failed to persist added response: {}", e);
        }
        result
    }

    /// Append a match to the stub's debug trail and flush.
    ///
    /// Never fails: the caller's response must go out even when the trail
    /// cannot be written.
    pub async fn record_match(
        &self,
        request: Value,
        response: Value,
        response_config: ResponseConfig,
        processing_time: u64,
    ) {
        let record = Match {
            timestamp: chrono::Utc::now().to_rfc3339(),
            request,
            response,
            response_config,
            processing_time,
        };
        self.state.lock().stub.matches.push(record);

        let Some(owner) = self.attached_owner() else {
            return;
        };
        if let Err(e) = owner.flush_current("match").await {
            warn!(port = owner.port(), index = ?self.index.get(), "Failed to persist match record: {}", e);
            metrics::record_match_dropped(owner.port());
        }
    }

    pub fn matches_count(&self) -> usize {
        self.state.lock().stub.matches.len()
    }

    pub fn responses_count(&self) -> usize {
        self.state.lock().stub.responses.len()
    }

    /// Copy of the stub; `matches` is emptied unless `debug` is set
    pub fn snapshot(&self, debug: bool) -> Stub {
        let mut stub = self.state.lock().stub.clone();
        if !debug {
            stub.matches.clear();
        }
        stub
    }

    fn attached_owner(&self) -> Option<Arc<Shared>> {
        self.index.get()?;
        self.owner.upgrade()
    }
}

impl fmt::Debug for StubEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StubEntry")
            .field("index", &self.index)
            .field("responses", &state.stub.responses.len())
            .field("sequencer", &state.sequencer)
            .finish()
    }
}
