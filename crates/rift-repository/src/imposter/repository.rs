//! ImposterRepository - persisted CRUD over imposters.
//!
//! Also owns the live stub repositories, one per port, so that every caller
//! working on an imposter shares the same rotation state.

use super::actions::ActionRegistry;
use super::document::ImposterWriter;
use super::types::Imposter;
use crate::config::{RepositoryConfig, StoreConfig};
use crate::error::{RepositoryError, RepositoryResult};
use crate::store::{create_document_store, DocumentStore, KeyFilter};
use crate::stubs::StubRepository;
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Persisted imposters plus the live stub lists that belong to them
pub struct ImposterRepository {
    writer: ImposterWriter,
    actions: Arc<ActionRegistry>,
    persist_requests: bool,
    /// Live stub repositories by port
    stubs: RwLock<HashMap<u16, StubRepository>>,
}

impl ImposterRepository {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        actions: Arc<ActionRegistry>,
        persist_requests: bool,
    ) -> Self {
        Self {
            writer: ImposterWriter::new(store),
            actions,
            persist_requests,
            stubs: RwLock::new(HashMap::new()),
        }
    }

    /// Build the configured store and connect to it
    pub async fn open(
        config: &RepositoryConfig,
        actions: Arc<ActionRegistry>,
    ) -> RepositoryResult<Self> {
        let store = create_document_store(&config.store)?;
        let repository = Self::new(store, actions, config.persist_requests);
        repository.connect().await?;
        Ok(repository)
    }

    pub fn actions(&self) -> &Arc<ActionRegistry> {
        &self.actions
    }

    pub async fn connect(&self) -> RepositoryResult<()> {
        self.writer.store().connect().await?;
        debug!("Imposter store connected");
        Ok(())
    }

    /// Release the store connection. Failures are logged, not returned.
    pub async fn close(&self) {
        match self.writer.store().close().await {
            Ok(()) => debug!("Imposter store closed"),
            Err(e) => error!("Failed to close imposter store: {}", e),
        }
    }

    /// Create the imposter collection
    pub async fn migrate(config: &StoreConfig) -> RepositoryResult<()> {
        let store = create_document_store(config)?;
        store.connect().await?;
        let result = store.create_collection().await;
        store.close().await?;
        result?;
        info!(database = %config.database, "Imposter collection created");
        Ok(())
    }

    /// Drop the imposter collection and everything in it
    pub async fn teardown(config: &StoreConfig) -> RepositoryResult<()> {
        let store = create_document_store(config)?;
        store.connect().await?;
        let result = store.drop_collection().await;
        store.close().await?;
        result?;
        info!(database = %config.database, "Imposter collection dropped");
        Ok(())
    }

    /// Persist a new imposter.
    ///
    /// An imposter submitted without stubs takes over whatever stubs were
    /// already added through `stubs_for` for its port.
    pub async fn add(&self, mut imposter: Imposter) -> RepositoryResult<Imposter> {
        let port = imposter.port;
        let pending = self.stubs.read().get(&port).cloned();

        match pending {
            Some(repo) if imposter.stubs.is_empty() => repo.insert_with(&mut imposter).await?,
            Some(_) => {
                self.writer.insert(&imposter).await?;
                self.drop_live_stubs(port).await;
            }
            None => self.writer.insert(&imposter).await?,
        }
        info!(port = port, stubs = imposter.stubs.len(), "Imposter added");
        Ok(imposter)
    }

    /// Load one imposter, resolving its shutdown action
    pub async fn get(&self, port: u16) -> RepositoryResult<Option<Imposter>> {
        let imposter = self.writer.load(port).await?;
        if let Some(imposter) = &imposter {
            self.actions.restore(port, imposter.stop.as_ref());
        }
        Ok(imposter)
    }

    /// Replace the stored imposter and refresh its live stub list
    pub async fn update(&self, imposter: &Imposter) -> RepositoryResult<()> {
        if !self.writer.replace(imposter).await? {
            return Err(RepositoryError::MissingResource(format!(
                "imposter on port {}",
                imposter.port
            )));
        }

        let live = self.stubs.read().get(&imposter.port).cloned();
        if let Some(repo) = live {
            let requests = self.persist_requests.then(|| imposter.requests.clone());
            repo.reload(imposter.stubs.clone(), requests).await;
        }
        debug!(port = imposter.port, "Imposter updated");
        Ok(())
    }

    /// Every stored imposter, ordered by port
    pub async fn all(&self) -> RepositoryResult<Vec<Imposter>> {
        let imposters = self.writer.load_all().await?;
        for imposter in &imposters {
            self.actions.restore(imposter.port, imposter.stop.as_ref());
        }
        Ok(imposters)
    }

    pub async fn exists(&self, port: u16) -> RepositoryResult<bool> {
        Ok(self.writer.load(port).await?.is_some())
    }

    /// Remove one imposter and stop it.
    ///
    /// Returns `None` when nothing is stored for `port`. The returned
    /// imposter has no `stop` action.
    pub async fn del(&self, port: u16) -> RepositoryResult<Option<Imposter>> {
        let removed = self.writer.take(KeyFilter::Port(port)).await?;
        self.drop_live_stubs(port).await;

        let Some(mut imposter) = removed else {
            debug!(port = port, "No imposter to delete");
            return Ok(None);
        };
        if let Some(action) = imposter.stop.take() {
            self.actions.invoke(port, &action).await;
        }
        info!(port = port, "Imposter deleted");
        Ok(Some(imposter))
    }

    /// Stop every imposter, then delete all of them
    pub async fn delete_all(&self) -> RepositoryResult<()> {
        let imposters = self.writer.load_all().await?;
        self.stop_each(&imposters).await;

        let deleted = self.writer.delete_many(KeyFilter::All).await?;
        self.drop_all_live_stubs().await;
        info!(deleted = deleted, "All imposters deleted");
        Ok(())
    }

    /// `delete_all`, then run `after` whether or not the delete succeeded
    pub async fn delete_all_then<F, Fut>(&self, after: F) -> RepositoryResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let result = self.delete_all().await;
        after().await;
        result
    }

    /// `delete_all`, then release the store connection
    pub async fn delete_all_and_close(&self) -> RepositoryResult<()> {
        self.delete_all_then(|| self.close()).await
    }

    /// Stop every imposter without deleting anything, so the next process
    /// can `load_all` them again
    pub async fn stop_all(&self) -> RepositoryResult<()> {
        let imposters = self.writer.load_all().await?;
        self.stop_each(&imposters).await;
        self.drop_all_live_stubs().await;
        info!(stopped = imposters.len(), "All imposters stopped");
        Ok(())
    }

    /// Live stub repository for `port`.
    ///
    /// The first call loads the persisted stubs (none if the imposter does
    /// not exist yet); later calls return the same list.
    pub async fn stubs_for(&self, port: u16) -> RepositoryResult<StubRepository> {
        let live = self.stubs.read().get(&port).cloned();
        if let Some(repo) = live {
            return Ok(repo);
        }

        let (stubs, requests) = match self.writer.load(port).await? {
            Some(imposter) if self.persist_requests => (imposter.stubs, imposter.requests),
            Some(imposter) => (imposter.stubs, Vec::new()),
            None => (Vec::new(), Vec::new()),
        };
        let loaded = StubRepository::new(
            port,
            self.writer.clone(),
            self.persist_requests,
            stubs,
            requests,
        );

        let mut live = self.stubs.write();
        Ok(live.entry(port).or_insert(loaded).clone())
    }

    /// Rehydrate everything persisted by a previous process
    pub async fn load_all(&self) -> RepositoryResult<Vec<Imposter>> {
        let imposters = self.all().await?;
        info!(count = imposters.len(), "Loaded persisted imposters");
        Ok(imposters)
    }

    /// Run every imposter's shutdown action concurrently
    async fn stop_each(&self, imposters: &[Imposter]) {
        let stops = imposters.iter().filter_map(|imposter| {
            imposter
                .stop
                .as_ref()
                .map(|action| self.actions.invoke(imposter.port, action))
        });
        join_all(stops).await;
    }

    async fn drop_live_stubs(&self, port: u16) {
        let removed = self.stubs.write().remove(&port);
        if let Some(repo) = removed {
            repo.detach_all().await;
        }
    }

    async fn drop_all_live_stubs(&self) {
        let drained: Vec<_> = self.stubs.write().drain().map(|(_, repo)| repo).collect();
        for repo in drained {
            repo.detach_all().await;
        }
    }
}
