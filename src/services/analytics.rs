//! Admin dashboard
//!
//! Aggregates are computed in Postgres and cached in Redis for a short time.

use chrono::Utc;
use tracing::{debug, warn};
use crate::database::DatabaseService;
use crate::models::{Dashboard, EventStats};
use crate::services::redis::RedisService;
use crate::utils::errors::{EventDeskError, Result};

const DASHBOARD_CACHE_KEY: &str = "dashboard";
const DASHBOARD_TTL_SECONDS: u64 = 60;
const DASHBOARD_EVENTS: i64 = 5;

#[derive(Clone)]
pub struct AnalyticsService {
    db: DatabaseService,
    redis: RedisService,
}

impl AnalyticsService {
    pub fn new(db: DatabaseService, redis: RedisService) -> Self {
        Self { db, redis }
    }

    /// Dashboard figures, served from cache when fresh
    pub async fn dashboard(&self) -> Result<Dashboard> {
        match self.redis.get_query_result::<Dashboard>(DASHBOARD_CACHE_KEY).await {
            Ok(Some(cached)) => {
                debug!(generated_at = %cached.generated_at, "Dashboard served from cache");
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Dashboard cache unavailable"),
        }

        let dashboard = compute_dashboard(&self.db).await?;
        if let Err(e) = self
            .redis
            .cache_query_result(DASHBOARD_CACHE_KEY, &dashboard, Some(DASHBOARD_TTL_SECONDS))
            .await
        {
            warn!(error = %e, "Failed to cache dashboard");
        }
        Ok(dashboard)
    }

    /// Drop the cached dashboard after admin actions that change it
    pub async fn invalidate(&self) {
        if let Err(e) = self.redis.invalidate_query(DASHBOARD_CACHE_KEY).await {
            warn!(error = %e, "Failed to invalidate dashboard cache");
        }
    }

    pub async fn event_stats(&self, event_id: i64) -> Result<EventStats> {
        self.db
            .analytics
            .event_stats(event_id)
            .await?
            .ok_or(EventDeskError::EventNotFound { event_id })
    }
}

/// Build the dashboard straight from the database
pub async fn compute_dashboard(db: &DatabaseService) -> Result<Dashboard> {
    let overview = db.analytics.overview().await?;
    let top_events = db.analytics.recent_events(DASHBOARD_EVENTS).await?;

    Ok(Dashboard {
        overview,
        top_events,
        generated_at: Utc::now(),
    })
}
