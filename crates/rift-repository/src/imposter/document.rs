//! Imposter document codec and the shared write path.
//!
//! A stored document holds exactly one top-level field, named after the
//! port, whose value is the imposter: `{"4545": {"port": 4545, ...}}`.

use super::types::{Imposter, Stub};
use crate::error::{RepositoryError, RepositoryResult};
use crate::metrics;
use crate::store::{DocumentStore, KeyFilter};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Wrap an imposter into its stored document shape
pub fn wrap(imposter: &Imposter) -> RepositoryResult<Value> {
    let mut document = Map::new();
    document.insert(imposter.port.to_string(), serde_json::to_value(imposter)?);
    Ok(Value::Object(document))
}

/// Extract the imposter from a stored document.
///
/// Anything other than a single port-named field holding an imposter with
/// that same port is reported as a corrupted database.
pub fn unwrap(document: Value) -> RepositoryResult<Imposter> {
    let Value::Object(mut fields) = document else {
        return Err(RepositoryError::Database(
            "imposter document is not an object".to_string(),
        ));
    };
    if fields.len() != 1 {
        return Err(RepositoryError::Database(format!(
            "imposter document has {} top-level fields, expected 1",
            fields.len()
        )));
    }

    let key = fields.keys().next().cloned().unwrap_or_default();
    let port: u16 = key
        .parse()
        .map_err(|_| RepositoryError::Database(format!("imposter document key '{key}' is not a port")))?;
    let value = fields.remove(&key).unwrap_or(Value::Null);
    let imposter: Imposter = serde_json::from_value(value)?;

    if imposter.port != port {
        return Err(RepositoryError::Database(format!(
            "imposter document key {port} does not match imposter port {}",
            imposter.port
        )));
    }
    Ok(imposter)
}

/// Thin layer over the document store that speaks in imposters.
///
/// Every store call made by the repositories goes through here so that
/// operations are counted in one place.
#[derive(Clone)]
pub(crate) struct ImposterWriter {
    store: Arc<dyn DocumentStore>,
}

impl ImposterWriter {
    pub(crate) fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) async fn insert(&self, imposter: &Imposter) -> RepositoryResult<()> {
        let document = wrap(imposter)?;
        let result = self.store.insert_one(imposter.port, document).await;
        metrics::record_store_op("insert_one", &result);
        result
    }

    pub(crate) async fn load(&self, port: u16) -> RepositoryResult<Option<Imposter>> {
        let result = self.store.find_one(KeyFilter::Port(port)).await;
        metrics::record_store_op("find_one", &result);
        result?.map(unwrap).transpose()
    }

    pub(crate) async fn load_all(&self) -> RepositoryResult<Vec<Imposter>> {
        let result = self.store.find(KeyFilter::All).await;
        metrics::record_store_op("find", &result);
        result?.into_iter().map(unwrap).collect()
    }

    pub(crate) async fn take(&self, filter: KeyFilter) -> RepositoryResult<Option<Imposter>> {
        let result = self.store.find_one_and_delete(filter).await;
        metrics::record_store_op("find_one_and_delete", &result);
        result?.map(unwrap).transpose()
    }

    pub(crate) async fn delete_many(&self, filter: KeyFilter) -> RepositoryResult<u64> {
        let result = self.store.delete_many(filter).await;
        metrics::record_store_op("delete_many", &result);
        result
    }

    pub(crate) async fn replace(&self, imposter: &Imposter) -> RepositoryResult<bool> {
        let document = wrap(imposter)?;
        let result = self.store.replace_one(imposter.port, document).await;
        metrics::record_store_op("replace_one", &result);
        result
    }

    /// Write a stub list (and optionally the request log) into the stored
    /// imposter. An imposter that has not been persisted yet is left alone;
    /// its stubs stay in memory until `add` picks them up.
    pub(crate) async fn write_stubs(
        &self,
        port: u16,
        stubs: Vec<Stub>,
        requests: Option<Vec<Value>>,
    ) -> RepositoryResult<()> {
        let Some(mut imposter) = self.load(port).await? else {
            debug!(port = port, "Imposter not persisted yet, holding stubs in memory");
            return Ok(());
        };

        imposter.stubs = stubs;
        if let Some(requests) = requests {
            imposter.requests = requests;
        }
        if !self.replace(&imposter).await? {
            // Deleted between the read and the write
            debug!(port = port, "Imposter removed during stub write, dropping update");
        }
        Ok(())
    }
}
