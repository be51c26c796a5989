//! Conversation state storage
//!
//! Contexts are JSON values under `{prefix}context:{telegram_id}`. Redis
//! expires them on the context's own deadline, so no sweeper is needed.

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::{debug, error, warn};
use crate::utils::errors::Result;
use crate::config::RedisConfig;
use super::context::ConversationContext;

const MIN_TTL_SECONDS: u64 = 60;

/// Redis-backed conversation storage
#[derive(Clone)]
pub struct StateStorage {
    connection_manager: redis::aio::ConnectionManager,
    config: RedisConfig,
}

impl StateStorage {
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            config,
        })
    }

    pub async fn save_context(&self, context: &ConversationContext) -> Result<()> {
        context.ensure_within_limits()?;

        let key = self.context_key(context.user_id);
        let serialized = serde_json::to_string(context)?;
        let ttl_seconds = ttl_for(context.expires_at, self.config.ttl_seconds, Utc::now());

        let mut conn = self.connection_manager.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(&key, serialized, ttl_seconds).await {
            error!(user_id = context.user_id, error = %e, "Failed to save context to Redis");
            return Err(e.into());
        }

        debug!(
            user_id = context.user_id,
            scenario = ?context.scenario,
            step = ?context.step,
            ttl_seconds = ttl_seconds,
            "Context saved"
        );
        Ok(())
    }

    pub async fn load_context(&self, user_id: i64) -> Result<Option<ConversationContext>> {
        let key = self.context_key(user_id);
        let mut conn = self.connection_manager.clone();

        let serialized: Option<String> = conn.get(&key).await?;
        let Some(data) = serialized else {
            return Ok(None);
        };

        let context = match serde_json::from_str::<ConversationContext>(&data) {
            Ok(context) => context,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Discarding unreadable context");
                self.delete_context(user_id).await?;
                return Ok(None);
            }
        };

        if context.is_expired() {
            debug!(user_id = user_id, expires_at = ?context.expires_at, "Context expired");
            self.delete_context(user_id).await?;
            return Ok(None);
        }

        Ok(Some(context))
    }

    /// Stored context, or a fresh empty one
    pub async fn load_or_new(&self, user_id: i64) -> Result<ConversationContext> {
        Ok(self
            .load_context(user_id)
            .await?
            .unwrap_or_else(|| ConversationContext::new(user_id)))
    }

    pub async fn delete_context(&self, user_id: i64) -> Result<()> {
        let key = self.context_key(user_id);
        let mut conn = self.connection_manager.clone();

        let deleted: u32 = conn.del(&key).await?;
        debug!(user_id = user_id, deleted = deleted, "Context deleted");
        Ok(())
    }

    fn context_key(&self, user_id: i64) -> String {
        format!("{}context:{}", self.config.prefix, user_id)
    }
}

impl std::fmt::Debug for StateStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Redis TTL for a context: its own deadline, or the configured default
pub fn ttl_for(expires_at: Option<DateTime<Utc>>, default_seconds: u64, now: DateTime<Utc>) -> u64 {
    match expires_at {
        Some(expires_at) => (expires_at - now).num_seconds().max(MIN_TTL_SECONDS as i64) as u64,
        None => default_seconds.max(MIN_TTL_SECONDS),
    }
}
