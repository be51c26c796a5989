//! Admin dashboard figures

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct PlatformOverview {
    pub total_users: i64,
    pub banned_users: i64,
    pub organizers: i64,
    pub published_events: i64,
    pub draft_events: i64,
    pub cancelled_events: i64,
    pub active_registrations: i64,
    pub check_ins: i64,
    pub certificates: i64,
    pub survey_responses: i64,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventStats {
    pub event_id: i64,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub max_participants: Option<i32>,
    pub current_participants: i32,
    pub attended: i64,
    pub survey_responses: i64,
    pub average_rating: Option<f64>,
}

impl EventStats {
    /// Share of registered participants who were scanned in, in percent
    pub fn attendance_rate(&self) -> Option<f64> {
        if self.current_participants <= 0 {
            None
        } else {
            Some(self.attended as f64 * 100.0 / self.current_participants as f64)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub overview: PlatformOverview,
    pub top_events: Vec<EventStats>,
    pub generated_at: DateTime<Utc>,
}
