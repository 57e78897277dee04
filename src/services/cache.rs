//! Redis caching service implementation
//!
//! Display reads (event detail, upcoming listings, per-user registration
//! views) may be served from here with a bounded TTL. Capacity counts and
//! admission decisions never read from this cache; write paths invalidate
//! the affected keys as part of returning success.

use redis::{AsyncCommands, Client, RedisResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::utils::errors::{EventraError, Result};

/// Redis-backed cache for registration-derived views
#[derive(Debug, Clone)]
pub struct CacheService {
    client: Client,
    settings: Settings,
}

impl CacheService {
    /// Create a new CacheService instance
    pub fn new(settings: Settings) -> Result<Self> {
        let client = Client::open(settings.redis.url.as_str()).map_err(EventraError::Redis)?;

        Ok(Self { client, settings })
    }

    /// Get Redis connection
    async fn get_connection(&self) -> Result<redis::aio::Connection> {
        self.client
            .get_async_connection()
            .await
            .map_err(EventraError::Redis)
    }

    /// Set a value with TTL
    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize,
    {
        let mut conn = self.get_connection().await?;
        let serialized = serde_json::to_string(value).map_err(EventraError::Serialization)?;

        let full_key = format!("{}{}", self.settings.redis.prefix, key);
        let ttl = ttl_seconds.unwrap_or(self.settings.redis.ttl_seconds);

        let _: () = conn
            .set_ex(&full_key, serialized, ttl)
            .await
            .map_err(EventraError::Redis)?;

        debug!(key = %full_key, ttl = ttl, "Value set in cache");
        Ok(())
    }

    /// Get a value
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut conn = self.get_connection().await?;
        let full_key = format!("{}{}", self.settings.redis.prefix, key);

        let result: Option<String> = conn.get(&full_key).await.map_err(EventraError::Redis)?;

        match result {
            Some(data) => {
                let deserialized =
                    serde_json::from_str::<T>(&data).map_err(EventraError::Serialization)?;
                debug!(key = %full_key, "Cache hit");
                Ok(Some(deserialized))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let full_key = format!("{}{}", self.settings.redis.prefix, key);

        let deleted: i32 = conn.del(&full_key).await.map_err(EventraError::Redis)?;

        debug!(key = %full_key, deleted = deleted > 0, "Key deletion attempted");
        Ok(deleted > 0)
    }

    /// Delete all keys matching a pattern
    pub async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let full_pattern = format!("{}{}", self.settings.redis.prefix, pattern);

        let keys: Vec<String> = conn.keys(&full_pattern).await.map_err(EventraError::Redis)?;
        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = conn.del(&keys).await.map_err(EventraError::Redis)?;

        info!(pattern = %pattern, deleted = deleted, "Keys deleted by pattern");
        Ok(deleted)
    }

    /// Evict every registration-derived view of one event. Called by each
    /// write path before it reports success; failures are surfaced so the
    /// caller can decide (writers log and proceed, the write is committed).
    pub async fn invalidate_event(&self, event_id: i64) -> Result<()> {
        self.delete(&Self::event_key(event_id)).await?;
        self.delete_pattern(&format!("event:{}:*", event_id)).await?;
        self.delete_pattern(&format!("{}*", Self::UPCOMING_KEY)).await?;
        Ok(())
    }

    /// Evict a user's registration views
    pub async fn invalidate_user(&self, user_id: i64) -> Result<()> {
        self.delete(&Self::user_registrations_key(user_id)).await?;
        Ok(())
    }

    pub const UPCOMING_KEY: &'static str = "events:upcoming";

    pub fn upcoming_key(limit: i64) -> String {
        format!("{}:{}", Self::UPCOMING_KEY, limit)
    }

    pub fn event_key(event_id: i64) -> String {
        format!("event:{}", event_id)
    }

    pub fn event_registrations_key(event_id: i64) -> String {
        format!("event:{}:registrations", event_id)
    }

    pub fn user_registrations_key(user_id: i64) -> String {
        format!("user:{}:registrations", user_id)
    }

    /// Health check for the Redis connection
    pub async fn health_check(&self) -> Result<bool> {
        match self.get_connection().await {
            Ok(mut conn) => {
                let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                match result {
                    Ok(response) => Ok(response == "PONG"),
                    Err(e) => {
                        warn!(error = %e, "Redis health check failed");
                        Ok(false)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Redis connection failed");
                Ok(false)
            }
        }
    }
}
