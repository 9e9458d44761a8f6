//! Durable document store contract.
//!
//! Every imposter is persisted as one document of the shape
//! `{ "<port>": <imposter> }`, keyed by its port. A storage engine only has
//! to implement [`DocumentStore`]; the repositories never see anything but
//! this trait and an already-connected handle.

use crate::config::StoreConfig;
use crate::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Which documents an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFilter {
    /// Every document in the collection
    All,
    /// The document stored under a single port
    Port(u16),
}

impl KeyFilter {
    pub fn matches(&self, port: u16) -> bool {
        match self {
            KeyFilter::All => true,
            KeyFilter::Port(p) => *p == port,
        }
    }
}

/// Backend-agnostic document storage keyed by imposter port.
///
/// `find` returns documents ordered by ascending port.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Acquire the storage connection. Calling it twice is harmless.
    async fn connect(&self) -> RepositoryResult<()>;

    /// Release the storage connection. Safe to call if never connected.
    async fn close(&self) -> RepositoryResult<()>;

    /// Fails with [`RepositoryError::DuplicateKey`] if `port` is taken.
    async fn insert_one(&self, port: u16, document: Value) -> RepositoryResult<()>;

    async fn find_one(&self, filter: KeyFilter) -> RepositoryResult<Option<Value>>;

    async fn find(&self, filter: KeyFilter) -> RepositoryResult<Vec<Value>>;

    /// Atomically remove and return the first matching document.
    async fn find_one_and_delete(&self, filter: KeyFilter) -> RepositoryResult<Option<Value>>;

    /// Returns the number of documents removed.
    async fn delete_many(&self, filter: KeyFilter) -> RepositoryResult<u64>;

    /// Returns false when no document was stored under `port`.
    async fn replace_one(&self, port: u16, document: Value) -> RepositoryResult<bool>;

    async fn create_collection(&self) -> RepositoryResult<()>;

    async fn drop_collection(&self) -> RepositoryResult<()>;
}

/// Create a DocumentStore based on configuration
///
/// The returned store is not yet connected.
pub fn create_document_store(config: &StoreConfig) -> RepositoryResult<Arc<dyn DocumentStore>> {
    match config.backend.as_str() {
        "inmemory" => {
            use crate::backends::InMemoryDocumentStore;
            tracing::info!("Using InMemory DocumentStore");
            Ok(Arc::new(InMemoryDocumentStore::new()))
        }
        "redis" => {
            #[cfg(feature = "redis-backend")]
            {
                use crate::backends::RedisDocumentStore;

                let store = RedisDocumentStore::new(config)?;
                tracing::info!(
                    "Using redis DocumentStore (database={}, pool_size={})",
                    config.database,
                    config.pool_size
                );
                Ok(Arc::new(store))
            }

            #[cfg(not(feature = "redis-backend"))]
            {
                Err(RepositoryError::Config(
                    "Redis backend not available. Compile with --features redis-backend"
                        .to_string(),
                ))
            }
        }
        other => Err(RepositoryError::Config(format!(
            "unsupported store backend '{other}'"
        ))),
    }
}
