//! Read-only aggregate queries for the admin dashboard

use sqlx::PgPool;
use crate::models::analytics::{EventStats, PlatformOverview};
use crate::utils::errors::EventDeskError;

#[derive(Clone)]
#[derive(Debug)]
pub struct AnalyticsRepository {
    pool: PgPool,
}

impl AnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn overview(&self) -> Result<PlatformOverview, EventDeskError> {
        let overview = sqlx::query_as::<_, PlatformOverview>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE is_banned) AS banned_users,
                (SELECT COUNT(*) FROM users WHERE role IN ('organizer', 'admin')) AS organizers,
                (SELECT COUNT(*) FROM events WHERE status = 'published') AS published_events,
                (SELECT COUNT(*) FROM events WHERE status = 'draft') AS draft_events,
                (SELECT COUNT(*) FROM events WHERE status = 'cancelled') AS cancelled_events,
                (SELECT COUNT(*) FROM event_registrations WHERE status IN ('registered', 'attended')) AS active_registrations,
                (SELECT COUNT(*) FROM attendance_logs) AS check_ins,
                (SELECT COUNT(*) FROM certificates) AS certificates,
                (SELECT COUNT(*) FROM survey_responses) AS survey_responses,
                (SELECT AVG(rating)::FLOAT8 FROM survey_responses) AS average_rating
            "#
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(overview)
    }

    /// Most recent non-draft events with their attendance and rating
    pub async fn recent_events(&self, limit: i64) -> Result<Vec<EventStats>, EventDeskError> {
        let stats = sqlx::query_as::<_, EventStats>(
            r#"
            SELECT
                e.id AS event_id,
                e.title,
                e.starts_at,
                e.max_participants,
                e.current_participants,
                (SELECT COUNT(*) FROM attendance_logs a WHERE a.event_id = e.id) AS attended,
                (SELECT COUNT(*) FROM survey_responses s WHERE s.event_id = e.id) AS survey_responses,
                (SELECT AVG(s.rating)::FLOAT8 FROM survey_responses s WHERE s.event_id = e.id) AS average_rating
            FROM events e
            WHERE e.status = 'published'
            ORDER BY e.starts_at DESC
            LIMIT $1
            "#
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(stats)
    }

    /// Figures for a single event
    pub async fn event_stats(&self, event_id: i64) -> Result<Option<EventStats>, EventDeskError> {
        let stats = sqlx::query_as::<_, EventStats>(
            r#"
            SELECT
                e.id AS event_id,
                e.title,
                e.starts_at,
                e.max_participants,
                e.current_participants,
                (SELECT COUNT(*) FROM attendance_logs a WHERE a.event_id = e.id) AS attended,
                (SELECT COUNT(*) FROM survey_responses s WHERE s.event_id = e.id) AS survey_responses,
                (SELECT AVG(s.rating)::FLOAT8 FROM survey_responses s WHERE s.event_id = e.id) AS average_rating
            FROM events e
            WHERE e.id = $1
            "#
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stats)
    }
}
