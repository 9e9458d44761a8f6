//! Persisted imposters.
//!
//! ## Module Structure
//!
//! - `types`: imposter, stub, response and match records
//! - `actions`: shutdown actions resolved through a handler registry
//! - `document`: the stored document shape and the shared write path
//! - `repository`: ImposterRepository, CRUD plus the live stub lists

mod actions;
pub(crate) mod document;
mod repository;
mod types;

#[cfg(test)]
mod tests;

pub use actions::{ActionRegistry, ShutdownAction, ShutdownHandler};
pub use document::{unwrap as unwrap_document, wrap as wrap_document};
pub use repository::ImposterRepository;
pub use types::{
    Imposter, Match, ResponseConfig, SnapshotOptions, Stub, PROXY_RESPONSE_TIME_FIELD,
};
