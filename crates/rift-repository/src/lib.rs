//! Persistence for Mountebank-compatible imposters.
//!
//! Imposters are stored as documents keyed by port. Each imposter's stub list
//! is served from a live, write-through [`StubRepository`] that resolves the
//! stub answering a request and rotates through its responses.

pub mod backends;
pub mod config;
pub mod error;
pub mod imposter;
pub mod metrics;
pub mod store;
pub mod stubs;

pub use config::{RepositoryConfig, StoreConfig};
pub use error::{RepositoryError, RepositoryResult};
pub use imposter::{
    ActionRegistry, Imposter, ImposterRepository, Match, ResponseConfig, ShutdownAction,
    ShutdownHandler, SnapshotOptions, Stub,
};
pub use store::{create_document_store, DocumentStore, KeyFilter};
pub use stubs::{NextResponse, StubEntry, StubIndex, StubMatch, StubRepository};
