use crate::config::StoreConfig;
use crate::error::{RepositoryError, RepositoryResult};
use crate::store::{DocumentStore, KeyFilter};
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::{Commands, Connection, ConnectionLike};
use serde_json::Value;
use std::time::Duration;

/// Redis implementation of DocumentStore
///
/// Each imposter document is a JSON string under `<database>:imposters:<port>`.
/// The client is the synchronous one behind an r2d2 pool; every call runs on
/// the blocking thread pool so the async callers are only suspended.
///
/// # Compatibility
///
/// - Redis 6.2+ (GETDEL is required for atomic find-and-delete)
/// - Valkey: Likely compatible but not officially supported
struct RedisConnectionManager {
    client: redis::Client,
}

impl RedisConnectionManager {
    fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

impl r2d2::ManageConnection for RedisConnectionManager {
    type Connection = Connection;
    type Error = redis::RedisError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        self.client.get_connection()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        redis::cmd("PING").query(conn)
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        !conn.is_open()
    }
}

type Pool = r2d2::Pool<RedisConnectionManager>;

pub struct RedisDocumentStore {
    client: redis::Client,
    pool: RwLock<Option<Pool>>,
    key_prefix: String,
    collection_key: String,
    pool_size: usize,
    connect_timeout: Duration,
}

impl RedisDocumentStore {
    /// Create a new Redis document store
    ///
    /// Only the URI is parsed here; no connection is opened until
    /// [`DocumentStore::connect`].
    pub fn new(config: &StoreConfig) -> RepositoryResult<Self> {
        let uri = config
            .uri
            .as_deref()
            .ok_or_else(|| RepositoryError::Config("redis backend requires 'uri'".to_string()))?;
        let client = redis::Client::open(uri)
            .map_err(|e| RepositoryError::Config(format!("failed to parse Redis URI: {e}")))?;

        Ok(Self {
            client,
            pool: RwLock::new(None),
            key_prefix: config.key_prefix(),
            collection_key: format!("{}:collections:imposters", config.database),
            pool_size: config.pool_size,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        })
    }

    fn make_key(&self, port: u16) -> String {
        format!("{}{}", self.key_prefix, port)
    }

    fn connected_pool(&self) -> RepositoryResult<Pool> {
        self.pool
            .read()
            .clone()
            .ok_or_else(|| RepositoryError::Database("redis store is not connected".to_string()))
    }

    /// Run `f` with a pooled connection on the blocking thread pool
    async fn run<T, F>(&self, operation: &'static str, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> RepositoryResult<T> + Send + 'static,
    {
        let pool = self.connected_pool()?;
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::Database(format!("failed to get Redis connection from pool: {e}"))
            })?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| RepositoryError::Database(format!("redis {operation} task failed: {e}")))?
    }
}

/// All document keys under `prefix`, ordered by port
fn scan_documents(conn: &mut Connection, prefix: &str) -> RepositoryResult<Vec<(u16, String)>> {
    let keys: Vec<String> = conn
        .scan_match::<_, String>(format!("{prefix}*"))
        .map_err(RepositoryError::database)?
        .collect();

    let mut documents: Vec<(u16, String)> = keys
        .into_iter()
        .filter_map(|key| {
            let port = key.strip_prefix(prefix)?.parse::<u16>().ok()?;
            Some((port, key))
        })
        .collect();
    documents.sort_by_key(|(port, _)| *port);
    Ok(documents)
}

fn matching_keys(
    conn: &mut Connection,
    prefix: &str,
    filter: KeyFilter,
) -> RepositoryResult<Vec<String>> {
    match filter {
        KeyFilter::Port(port) => Ok(vec![format!("{prefix}{port}")]),
        KeyFilter::All => Ok(scan_documents(conn, prefix)?
            .into_iter()
            .map(|(_, key)| key)
            .collect()),
    }
}

fn parse_document(json: Option<String>) -> RepositoryResult<Option<Value>> {
    json.map(|s| serde_json::from_str(&s).map_err(RepositoryError::from))
        .transpose()
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn connect(&self) -> RepositoryResult<()> {
        if self.pool.read().is_some() {
            return Ok(());
        }

        let manager = RedisConnectionManager::new(self.client.clone());
        let pool_size = self.pool_size as u32;
        let timeout = self.connect_timeout;
        let pool = tokio::task::spawn_blocking(move || -> RepositoryResult<Pool> {
            let pool = r2d2::Pool::builder()
                .max_size(pool_size)
                .connection_timeout(timeout)
                .build(manager)
                .map_err(|e| {
                    RepositoryError::Database(format!("failed to create Redis connection pool: {e}"))
                })?;

            // Test connection with PING
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::Database(format!("failed to get connection from pool: {e}"))
            })?;
            let _: String = redis::cmd("PING")
                .query(&mut *conn)
                .map_err(|e| RepositoryError::Database(format!("failed to PING Redis: {e}")))?;
            drop(conn);
            Ok(pool)
        })
        .await
        .map_err(|e| RepositoryError::Database(format!("redis connect task failed: {e}")))??;

        tracing::info!(
            "Connected to Redis with prefix={}, pool_size={}",
            self.key_prefix,
            self.pool_size
        );
        *self.pool.write() = Some(pool);
        Ok(())
    }

    async fn close(&self) -> RepositoryResult<()> {
        if self.pool.write().take().is_some() {
            tracing::debug!("Closed Redis pool for prefix={}", self.key_prefix);
        }
        Ok(())
    }

    async fn insert_one(&self, port: u16, document: Value) -> RepositoryResult<()> {
        let key = self.make_key(port);
        let json = serde_json::to_string(&document)?;
        let inserted = self
            .run("insert_one", move |conn| {
                // SET NX replies nil when the key already exists
                let reply: Option<String> = redis::cmd("SET")
                    .arg(&key)
                    .arg(json)
                    .arg("NX")
                    .query(conn)
                    .map_err(RepositoryError::database)?;
                Ok(reply.is_some())
            })
            .await?;

        if inserted {
            Ok(())
        } else {
            Err(RepositoryError::DuplicateKey(port))
        }
    }

    async fn find_one(&self, filter: KeyFilter) -> RepositoryResult<Option<Value>> {
        let prefix = self.key_prefix.clone();
        let json = self
            .run("find_one", move |conn| {
                for key in matching_keys(conn, &prefix, filter)? {
                    let value: Option<String> = conn.get(&key).map_err(RepositoryError::database)?;
                    if value.is_some() {
                        return Ok(value);
                    }
                }
                Ok(None)
            })
            .await?;
        parse_document(json)
    }

    async fn find(&self, filter: KeyFilter) -> RepositoryResult<Vec<Value>> {
        let prefix = self.key_prefix.clone();
        let values = self
            .run("find", move |conn| {
                let mut values = Vec::new();
                for key in matching_keys(conn, &prefix, filter)? {
                    let value: Option<String> = conn.get(&key).map_err(RepositoryError::database)?;
                    values.extend(value);
                }
                Ok(values)
            })
            .await?;

        values
            .into_iter()
            .map(|s| serde_json::from_str(&s).map_err(RepositoryError::from))
            .collect()
    }

    async fn find_one_and_delete(&self, filter: KeyFilter) -> RepositoryResult<Option<Value>> {
        let prefix = self.key_prefix.clone();
        let json = self
            .run("find_one_and_delete", move |conn| {
                for key in matching_keys(conn, &prefix, filter)? {
                    let value: Option<String> = redis::cmd("GETDEL")
                        .arg(&key)
                        .query(conn)
                        .map_err(RepositoryError::database)?;
                    if value.is_some() {
                        return Ok(value);
                    }
                }
                Ok(None)
            })
            .await?;
        parse_document(json)
    }

    async fn delete_many(&self, filter: KeyFilter) -> RepositoryResult<u64> {
        let prefix = self.key_prefix.clone();
        self.run("delete_many", move |conn| {
            let keys = matching_keys(conn, &prefix, filter)?;
            if keys.is_empty() {
                return Ok(0);
            }
            redis::cmd("DEL")
                .arg(&keys)
                .query(conn)
                .map_err(RepositoryError::database)
        })
        .await
    }

    async fn replace_one(&self, port: u16, document: Value) -> RepositoryResult<bool> {
        let key = self.make_key(port);
        let json = serde_json::to_string(&document)?;
        self.run("replace_one", move |conn| {
            // SET XX only overwrites an existing key
            let reply: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(json)
                .arg("XX")
                .query(conn)
                .map_err(RepositoryError::database)?;
            Ok(reply.is_some())
        })
        .await
    }

    async fn create_collection(&self) -> RepositoryResult<()> {
        let collection_key = self.collection_key.clone();
        self.run("create_collection", move |conn| {
            let _: () = conn
                .set(&collection_key, chrono::Utc::now().to_rfc3339())
                .map_err(RepositoryError::database)?;
            Ok(())
        })
        .await
    }

    async fn drop_collection(&self) -> RepositoryResult<()> {
        let prefix = self.key_prefix.clone();
        let collection_key = self.collection_key.clone();
        self.run("drop_collection", move |conn| {
            let mut keys = matching_keys(conn, &prefix, KeyFilter::All)?;
            keys.push(collection_key);
            let _: u64 = redis::cmd("DEL")
                .arg(&keys)
                .query(conn)
                .map_err(RepositoryError::database)?;
            Ok(())
        })
        .await
    }
}
