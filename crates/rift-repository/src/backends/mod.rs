//! Storage backends for imposter documents.

mod inmemory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use inmemory::InMemoryDocumentStore;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisDocumentStore;
