//! Event repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::event::{Event, EventStatus, CreateEventRequest, UpdateEventRequest};
use crate::models::registration::ParticipantEntry;
use crate::utils::errors::EventDeskError;

pub(crate) const EVENT_COLUMNS: &str =
    "id, title, description, venue, starts_at, ends_at, max_participants, current_participants, status, certificates_issued, created_by, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event in draft status
    pub async fn create(&self, request: CreateEventRequest) -> Result<Event, EventDeskError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (title, description, venue, starts_at, ends_at, max_participants, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(request.title)
        .bind(request.description)
        .bind(request.venue)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.max_participants)
        .bind(request.created_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, EventDeskError> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    /// Full-record update
    ///
    /// Returns `None` when the event is cancelled or the new capacity would
    /// drop below the places already taken.
    pub async fn update(&self, id: i64, request: UpdateEventRequest) -> Result<Option<Event>, EventDeskError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                venue = COALESCE($4, venue),
                starts_at = COALESCE($5, starts_at),
                ends_at = COALESCE($6, ends_at),
                max_participants = COALESCE($7, max_participants),
                updated_at = $8
            WHERE id = $1
              AND status <> 'cancelled'
              AND ($7::INTEGER IS NULL OR $7 >= current_participants)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.venue)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.max_participants)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Compare-and-set the lifecycle status
    pub async fn transition_status(&self, id: i64, from: EventStatus, to: EventStatus) -> Result<Option<Event>, EventDeskError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Delete an event that was never published
    pub async fn delete_draft(&self, id: i64) -> Result<bool, EventDeskError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1 AND status = 'draft'")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Published events that have not ended yet
    pub async fn list_upcoming(&self, limit: i64) -> Result<Vec<Event>, EventDeskError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events
            WHERE status = 'published' AND ends_at > NOW()
            ORDER BY starts_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Events owned by an organizer, newest first
    pub async fn list_by_organizer(&self, user_id: i64) -> Result<Vec<Event>, EventDeskError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE created_by = $1 ORDER BY starts_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Active participants of an event
    pub async fn list_participants(&self, event_id: i64) -> Result<Vec<ParticipantEntry>, EventDeskError> {
        let participants = sqlx::query_as::<_, ParticipantEntry>(
            r#"
            SELECT r.id AS registration_id, u.id AS user_id, u.telegram_id, u.username, u.full_name,
                   u.first_name, r.status, r.registered_at, r.attended_at
            FROM event_registrations r
            JOIN users u ON u.id = r.user_id
            WHERE r.event_id = $1 AND r.status IN ('registered', 'attended')
            ORDER BY r.registered_at ASC
            "#
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }

    /// Count events
    pub async fn count(&self) -> Result<i64, EventDeskError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
