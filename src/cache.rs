//! Best-effort read cache.
//!
//! Every helper in this module swallows backend failures: a cache that is
//! down behaves exactly like an empty cache and callers fall through to the
//! database.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;
}

pub mod keys {
    use uuid::Uuid;

    pub fn cart(cart_id: Uuid) -> String {
        format!("cart:{cart_id}")
    }

    pub fn user_cart(user_id: Uuid) -> String {
        format!("cart:user:{user_id}")
    }
}

/// Both keys a cart is reachable under.
pub fn cart_keys(cart_id: Uuid, user_id: Uuid) -> Vec<String> {
    vec![keys::cart(cart_id), keys::user_cart(user_id)]
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = match cache.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(error = %err, key, "cache read failed");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(error = %err, key, "discarding undecodable cache entry");
            None
        }
    }
}

pub async fn put_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    let result = match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, raw, ttl).await,
        Err(err) => Err(err.into()),
    };
    if let Err(err) = result {
        tracing::warn!(error = %err, key, "cache write failed");
    }
}

pub async fn invalidate(cache: &dyn Cache, keys: &[String]) {
    if let Err(err) = cache.delete(keys).await {
        tracing::warn!(error = %err, ?keys, "cache invalidation failed");
    }
}

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}

/// Process-local cache used when no Redis is configured, and by tests.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        matches!(self.get(key).await, Ok(Some(_)))
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| *expires_at > Instant::now());
        entries.insert(key.to_owned(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}
