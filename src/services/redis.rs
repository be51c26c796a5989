//! Redis cache service
//!
//! JSON values under the configured key prefix, used for cached query
//! results such as the admin dashboard.

use redis::{aio::ConnectionManager, AsyncCommands, RedisResult};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{warn, debug};
use crate::config::RedisConfig;
use crate::utils::errors::Result;

/// Redis service for caching
#[derive(Clone)]
pub struct RedisService {
    connection_manager: ConnectionManager,
    config: RedisConfig,
}

impl RedisService {
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection_manager = ConnectionManager::new(client).await?;

        Ok(Self { connection_manager, config })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    /// Set a value with TTL, falling back to the configured default TTL
    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize,
    {
        let mut conn = self.connection_manager.clone();
        let serialized = serde_json::to_string(value)?;
        let full_key = self.full_key(key);
        let ttl = ttl_seconds.unwrap_or(self.config.ttl_seconds);

        conn.set_ex::<_, _, ()>(&full_key, serialized, ttl).await?;

        debug!(key = %full_key, ttl = ttl, "Value set in Redis");
        Ok(())
    }

    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.connection_manager.clone();
        let full_key = self.full_key(key);

        let result: Option<String> = conn.get(&full_key).await?;
        match result {
            Some(data) => Ok(Some(serde_json::from_str::<T>(&data)?)),
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection_manager.clone();
        let full_key = self.full_key(key);

        let deleted: i32 = conn.del(&full_key).await?;
        Ok(deleted > 0)
    }

    /// Cache a database query result
    pub async fn cache_query_result<T>(&self, query_key: &str, result: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize,
    {
        self.set(&format!("query:{}", query_key), result, ttl_seconds).await
    }

    pub async fn get_query_result<T>(&self, query_key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.get(&format!("query:{}", query_key)).await
    }

    pub async fn invalidate_query(&self, query_key: &str) -> Result<bool> {
        self.delete(&format!("query:{}", query_key)).await
    }

    /// Health check for Redis connection
    pub async fn health_check(&self) -> bool {
        let mut conn = self.connection_manager.clone();
        let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(response) => response == "PONG",
            Err(e) => {
                warn!(error = %e, "Redis health check failed");
                false
            }
        }
    }
}
