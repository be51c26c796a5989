//! Rate limiting middleware
//!
//! Per-user token bucket in front of the dispatcher so a single account
//! cannot flood the bot (or the database behind it).

use std::num::NonZeroU32;
use std::sync::Arc;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use teloxide::types::{Update, User};
use tracing::{debug, warn};
use crate::config::settings::RateLimitConfig;
use crate::utils::errors::{EventDeskError, Result};

/// Rate limiting middleware
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<DefaultKeyedRateLimiter<i64>>,
    admin_exempt: bool,
    admin_ids: Vec<i64>,
}

impl RateLimitMiddleware {
    pub fn new(config: &RateLimitConfig, admin_ids: Vec<i64>) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota(config))),
            admin_exempt: config.admin_exempt,
            admin_ids,
        }
    }

    /// Check if user is rate limited
    pub fn check_rate_limit(&self, user: &User) -> Result<()> {
        let user_id = user.id.0 as i64;

        if self.admin_exempt && self.admin_ids.contains(&user_id) {
            debug!(user_id = user_id, "Admin user exempt from rate limiting");
            return Ok(());
        }

        self.limiter.check_key(&user_id).map_err(|_| {
            warn!(
                user_id = user_id,
                username = user.username.as_deref().unwrap_or("none"),
                "Rate limit exceeded"
            );
            EventDeskError::RateLimitExceeded
        })
    }

    /// Dispatcher filter: updates without a sender always pass
    pub fn allows(&self, update: &Update) -> bool {
        match update.from() {
            Some(user) => self.check_rate_limit(user).is_ok(),
            None => true,
        }
    }

    /// Drop buckets that have fully refilled
    pub fn cleanup(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!(tracked_users = self.limiter.len(), "Rate limiter state cleaned up");
    }
}

fn quota(config: &RateLimitConfig) -> Quota {
    let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst).unwrap_or(per_minute);
    Quota::per_minute(per_minute).allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::UserId;

    fn user(id: u64) -> User {
        User {
            id: UserId(id),
            is_bot: false,
            first_name: "Test".to_string(),
            last_name: None,
            username: None,
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    fn config(burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: 1,
            burst,
            admin_exempt: true,
        }
    }

    #[test]
    fn test_burst_then_limited() {
        let middleware = RateLimitMiddleware::new(&config(3), vec![]);
        let sender = user(1);

        for _ in 0..3 {
            assert!(middleware.check_rate_limit(&sender).is_ok());
        }
        assert!(matches!(
            middleware.check_rate_limit(&sender),
            Err(EventDeskError::RateLimitExceeded)
        ));
    }

    #[test]
    fn test_limits_are_per_user() {
        let middleware = RateLimitMiddleware::new(&config(1), vec![]);

        assert!(middleware.check_rate_limit(&user(1)).is_ok());
        assert!(middleware.check_rate_limit(&user(1)).is_err());
        assert!(middleware.check_rate_limit(&user(2)).is_ok());
    }

    #[test]
    fn test_admin_exemption() {
        let middleware = RateLimitMiddleware::new(&config(1), vec![7]);

        for _ in 0..10 {
            assert!(middleware.check_rate_limit(&user(7)).is_ok());
        }
    }

    #[test]
    fn test_zero_burst_falls_back_to_rate() {
        let quota = quota(&RateLimitConfig {
            requests_per_minute: 5,
            burst: 0,
            admin_exempt: false,
        });
        assert_eq!(quota.burst_size().get(), 5);
    }
}
