//! Document store connection configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default = "default_backend_type")]
    pub backend: String, // "inmemory" or "redis"
    /// Connection string, e.g. "redis://localhost:6379"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Namespace for imposter documents
    #[serde(default = "default_database", alias = "db")]
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_backend_type() -> String {
    "inmemory".to_string()
}

fn default_database() -> String {
    "mountebank".to_string()
}

fn default_pool_size() -> usize {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend_type(),
            uri: None,
            database: default_database(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// Key prefix shared by every document in this namespace
    pub fn key_prefix(&self) -> String {
        format!("{}:imposters:", self.database)
    }
}
