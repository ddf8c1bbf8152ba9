//! Key-value storage for conversation state and cached credentials.
//!
//! Production runs against Redis; [`MemoryStore`] keeps the same semantics
//! in-process for tests and local runs without a Redis server.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Errors raised by a key-value backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stored value could not be decoded
    #[error("Corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Minimal key-value contract the bot needs
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value without expiry
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Write a value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a value, succeeding when it is already absent
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Redis-backed store
///
/// `ConnectionManager` reconnects on its own and is cheap to clone, so every
/// call clones it instead of holding a lock.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with a PING
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let mut connection = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        info!("Connected to Redis");

        Ok(Self { connection })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.set(key, value).await?;
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        let _: () = connection.set_ex(key, value, seconds).await?;
        debug!(key, ttl_secs = seconds, "Stored value with expiry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.del(key).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |deadline| Instant::now() < deadline)
    }
}

/// In-process store with Redis-like expiry semantics
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_live())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        let value = entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone());
        if value.is_none() {
            // Drop expired entries lazily, like Redis does on access
            entries.remove(key);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().await.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries.lock().await.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_and_get() -> Result<(), StoreError> {
        let store = MemoryStore::new();

        assert_eq!(store.get("state:1").await?, None);
        store.set("state:1", "HANDLE_MENU").await?;
        assert_eq!(store.get("state:1").await?.as_deref(), Some("HANDLE_MENU"));

        store.set("state:1", "HANDLE_CART").await?;
        assert_eq!(store.get("state:1").await?.as_deref(), Some("HANDLE_CART"));
        assert_eq!(store.len().await, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_store_expiry() -> Result<(), StoreError> {
        let store = MemoryStore::new();

        store.set_with_ttl("token", "abc", Duration::ZERO).await?;
        assert_eq!(store.get("token").await?, None);
        assert!(store.is_empty().await);

        store.set_with_ttl("token", "abc", Duration::from_secs(3600)).await?;
        assert_eq!(store.get("token").await?.as_deref(), Some("abc"));

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_store_delete() -> Result<(), StoreError> {
        let store = MemoryStore::new();

        store.set("key", "value").await?;
        store.delete("key").await?;
        store.delete("key").await?;
        assert_eq!(store.get("key").await?, None);

        Ok(())
    }
}
