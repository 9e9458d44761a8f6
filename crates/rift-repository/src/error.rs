//! Error types for the imposter repository.

/// Errors surfaced by the repository and its storage adapters.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// No usable storage configuration was found at startup.
    #[error("missing configuration file: {0}")]
    MissingConfig(String),
    /// The configuration exists but cannot be used.
    #[error("configuration error: {0}")]
    Config(String),
    /// The caller referenced an imposter or stub index that does not exist.
    #[error("no such resource: {0}")]
    MissingResource(String),
    #[error("imposter already exists on port {0}")]
    DuplicateKey(u16),
    /// Failure inside the storage adapter, wrapping its native error.
    #[error("corrupted database: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn missing_stub(index: usize) -> Self {
        Self::MissingResource(format!("stub index {index} out of bounds"))
    }

    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    pub fn is_missing_resource(&self) -> bool {
        matches!(self, Self::MissingResource(_))
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
