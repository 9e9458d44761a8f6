use crate::error::{RepositoryError, RepositoryResult};
use crate::store::{DocumentStore, KeyFilter};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory implementation of DocumentStore
///
/// Documents live in an ordered map keyed by port, so `find` is naturally
/// port-ordered. Useful for testing, development, and single-instance
/// deployments where nothing needs to survive a restart.
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<BTreeMap<u16, Value>>>,
    connected: AtomicBool,
    collection_created: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(BTreeMap::new())),
            connected: AtomicBool::new(false),
            collection_created: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn collection_exists(&self) -> bool {
        self.collection_created.load(Ordering::Acquire)
    }

    fn ensure_connected(&self) -> RepositoryResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RepositoryError::Database(
                "in-memory store is not connected".to_string(),
            ))
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn connect(&self) -> RepositoryResult<()> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn close(&self) -> RepositoryResult<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn insert_one(&self, port: u16, document: Value) -> RepositoryResult<()> {
        self.ensure_connected()?;
        let mut documents = self.documents.write();
        if documents.contains_key(&port) {
            return Err(RepositoryError::DuplicateKey(port));
        }
        // Inserting into a missing collection creates it
        self.collection_created.store(true, Ordering::Release);
        documents.insert(port, document);
        Ok(())
    }

    async fn find_one(&self, filter: KeyFilter) -> RepositoryResult<Option<Value>> {
        self.ensure_connected()?;
        let documents = self.documents.read();
        Ok(documents
            .iter()
            .find(|(port, _)| filter.matches(**port))
            .map(|(_, doc)| doc.clone()))
    }

    async fn find(&self, filter: KeyFilter) -> RepositoryResult<Vec<Value>> {
        self.ensure_connected()?;
        let documents = self.documents.read();
        Ok(documents
            .iter()
            .filter(|(port, _)| filter.matches(**port))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn find_one_and_delete(&self, filter: KeyFilter) -> RepositoryResult<Option<Value>> {
        self.ensure_connected()?;
        // Single write lock so the lookup and removal are one step
        let mut documents = self.documents.write();
        let port = documents.keys().copied().find(|port| filter.matches(*port));
        Ok(port.and_then(|port| documents.remove(&port)))
    }

    async fn delete_many(&self, filter: KeyFilter) -> RepositoryResult<u64> {
        self.ensure_connected()?;
        let mut documents = self.documents.write();
        let before = documents.len();
        documents.retain(|port, _| !filter.matches(*port));
        Ok((before - documents.len()) as u64)
    }

    async fn replace_one(&self, port: u16, document: Value) -> RepositoryResult<bool> {
        self.ensure_connected()?;
        let mut documents = self.documents.write();
        match documents.get_mut(&port) {
            Some(existing) => {
                *existing = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_collection(&self) -> RepositoryResult<()> {
        self.ensure_connected()?;
        self.collection_created.store(true, Ordering::Release);
        Ok(())
    }

    async fn drop_collection(&self) -> RepositoryResult<()> {
        self.ensure_connected()?;
        self.documents.write().clear();
        self.collection_created.store(false, Ordering::Release);
        Ok(())
    }
}
