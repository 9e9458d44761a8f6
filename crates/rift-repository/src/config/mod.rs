//! Configuration for the imposter repository.
//!
//! The configuration lives in an external file whose path is supplied at
//! startup. Both YAML and JSON are accepted, and the store section may be
//! named `mongo` as in a Mountebank datastore file. A `uri` only makes sense
//! for a durable backend, so a file that sets one without naming the backend
//! is rejected rather than silently falling back to the in-memory store.

mod store;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, RepositoryResult};

pub use store::StoreConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    #[serde(default, alias = "mongo")]
    pub store: StoreConfig,

    /// Write the per-imposter request log through to the store.
    /// When false the log is kept in process memory only.
    #[serde(default)]
    pub persist_requests: bool,
}

impl RepositoryConfig {
    /// Load configuration from the file at `path`.
    ///
    /// A missing path or a file that does not exist is a
    /// [`RepositoryError::MissingConfig`]; anything that cannot be read or
    /// parsed is a [`RepositoryError::Config`].
    pub fn from_file<P: AsRef<Path>>(path: Option<P>) -> RepositoryResult<Self> {
        let Some(path) = path else {
            return Err(RepositoryError::MissingConfig(
                "no repository configuration path supplied".to_string(),
            ));
        };
        let path = path.as_ref();
        if !path.exists() {
            return Err(RepositoryError::MissingConfig(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            RepositoryError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: RepositoryConfig = serde_yaml::from_str(&contents).map_err(|e| {
            RepositoryError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RepositoryResult<()> {
        match self.store.backend.as_str() {
            "inmemory" => {
                if let Some(uri) = self.store.uri.as_deref().filter(|uri| !uri.is_empty()) {
                    return Err(RepositoryError::Config(format!(
                        "'uri' {uri} is set but the backend is inmemory; set 'backend' to a durable store"
                    )));
                }
            }
            "redis" => {
                if self.store.uri.as_deref().map_or(true, str::is_empty) {
                    return Err(RepositoryError::Config(
                        "redis backend selected but no 'uri' provided".to_string(),
                    ));
                }
            }
            other => {
                return Err(RepositoryError::Config(format!(
                    "unsupported store backend '{other}'. Supported: inmemory, redis"
                )));
            }
        }

        if self.store.database.is_empty() {
            return Err(RepositoryError::Config(
                "'database' must not be empty".to_string(),
            ));
        }
        if self.store.pool_size == 0 {
            return Err(RepositoryError::Config(
                "'poolSize' must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
