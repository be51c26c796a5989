//! Registration repository
//!
//! Registration writes and the `current_participants` counter always change
//! in the same transaction. The counter is only ever moved by a conditional
//! single-statement update, so concurrent registrations can never push it
//! past `max_participants`.

use sqlx::{PgPool, Postgres, Transaction};
use chrono::Utc;
use uuid::Uuid;
use crate::database::repositories::event::EVENT_COLUMNS;
use crate::models::event::{Event, RegistrationEligibility};
use crate::models::registration::{EventRegistration, RegistrationStatus, RegisteredEvent};
use crate::utils::errors::EventDeskError;

const REGISTRATION_COLUMNS: &str =
    "id, event_id, user_id, status, ticket_nonce, registered_at, cancelled_at, attended_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Take a place in the event and create or reactivate the registration
    pub async fn register(&self, event_id: i64, user_id: i64) -> Result<(EventRegistration, Event), EventDeskError> {
        let mut tx = self.pool.begin().await?;

        // Locks an existing row so a concurrent cancel/register of the same pair waits
        let existing: Option<(RegistrationStatus,)> = sqlx::query_as(
            "SELECT status FROM event_registrations WHERE event_id = $1 AND user_id = $2 FOR UPDATE"
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if matches!(existing, Some((status,)) if status.is_active()) {
            return Err(EventDeskError::AlreadyRegistered { event_id, user_id });
        }

        let now = Utc::now();
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET current_participants = current_participants + 1, updated_at = $2
            WHERE id = $1
              AND status = 'published'
              AND ends_at > $2
              AND (max_participants IS NULL OR current_participants < max_participants)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let event = match event {
            Some(event) => event,
            None => return Err(Self::explain_rejection(&mut tx, event_id).await?),
        };

        let registration = sqlx::query_as::<_, EventRegistration>(&format!(
            r#"
            INSERT INTO event_registrations (event_id, user_id, status, ticket_nonce, registered_at)
            VALUES ($1, $2, 'registered', $3, $4)
            ON CONFLICT (event_id, user_id) DO UPDATE
            SET status = 'registered',
                ticket_nonce = EXCLUDED.ticket_nonce,
                registered_at = EXCLUDED.registered_at,
                cancelled_at = NULL,
                attended_at = NULL
            WHERE event_registrations.status = 'cancelled'
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(user_id)
        .bind(Uuid::new_v4())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping `tx` rolls the counter increment back
        let registration = registration.ok_or(EventDeskError::AlreadyRegistered { event_id, user_id })?;

        tx.commit().await?;
        Ok((registration, event))
    }

    async fn explain_rejection(tx: &mut Transaction<'_, Postgres>, event_id: i64) -> Result<EventDeskError, EventDeskError> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(event_id)
            .fetch_optional(&mut **tx)
            .await?;

        let Some(event) = event else {
            return Ok(EventDeskError::EventNotFound { event_id });
        };

        Ok(match event.registration_eligibility(Utc::now()) {
            RegistrationEligibility::NotPublished(status) => EventDeskError::EventNotOpen {
                event_id,
                status: status.to_string(),
            },
            RegistrationEligibility::Ended => EventDeskError::EventNotOpen {
                event_id,
                status: "ended".to_string(),
            },
            RegistrationEligibility::Full(capacity) => EventDeskError::EventFull { event_id, capacity },
            // A place was freed after the increment was refused
            RegistrationEligibility::Open => EventDeskError::EventFull {
                event_id,
                capacity: event.max_participants.unwrap_or_default(),
            },
        })
    }

    /// Release the place held by an active registration
    pub async fn cancel(&self, event_id: i64, user_id: i64) -> Result<EventRegistration, EventDeskError> {
        let mut tx = self.pool.begin().await?;

        let registration = sqlx::query_as::<_, EventRegistration>(&format!(
            r#"
            UPDATE event_registrations
            SET status = 'cancelled', cancelled_at = $3
            WHERE event_id = $1 AND user_id = $2 AND status = 'registered'
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(registration) = registration else {
            let current: Option<(RegistrationStatus,)> = sqlx::query_as(
                "SELECT status FROM event_registrations WHERE event_id = $1 AND user_id = $2"
            )
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

            return Err(match current {
                Some((RegistrationStatus::Attended,)) => EventDeskError::InvalidStateTransition {
                    from: RegistrationStatus::Attended.to_string(),
                    to: RegistrationStatus::Cancelled.to_string(),
                },
                _ => EventDeskError::NotRegistered { event_id, user_id },
            });
        };

        sqlx::query(
            r#"
            UPDATE events
            SET current_participants = GREATEST(current_participants - 1, 0), updated_at = $2
            WHERE id = $1
            "#
        )
        .bind(event_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(registration)
    }

    /// Recompute the participant counter from the registration rows
    pub async fn recount_participants(&self, event_id: i64) -> Result<i32, EventDeskError> {
        let count: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE events
            SET current_participants = (
                SELECT COUNT(*)::INTEGER FROM event_registrations
                WHERE event_id = $1 AND status IN ('registered', 'attended')
            ),
            updated_at = NOW()
            WHERE id = $1
            RETURNING current_participants
            "#
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        count
            .map(|(count,)| count)
            .ok_or(EventDeskError::EventNotFound { event_id })
    }

    /// Find registration by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<EventRegistration>, EventDeskError> {
        let registration = sqlx::query_as::<_, EventRegistration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM event_registrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration)
    }

    /// Find the registration row of a user for an event, whatever its status
    pub async fn find_for_user(&self, event_id: i64, user_id: i64) -> Result<Option<EventRegistration>, EventDeskError> {
        let registration = sqlx::query_as::<_, EventRegistration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM event_registrations WHERE event_id = $1 AND user_id = $2"
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration)
    }

    /// Registrations that still hold a place
    pub async fn list_active(&self, event_id: i64) -> Result<Vec<EventRegistration>, EventDeskError> {
        let registrations = sqlx::query_as::<_, EventRegistration>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS} FROM event_registrations
            WHERE event_id = $1 AND status IN ('registered', 'attended')
            ORDER BY registered_at ASC
            "#
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registrations)
    }

    /// Active registrations of a user joined with their events
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<RegisteredEvent>, EventDeskError> {
        let registrations = sqlx::query_as::<_, RegisteredEvent>(
            r#"
            SELECT r.id AS registration_id, r.status, e.id AS event_id, e.title, e.venue, e.starts_at, e.ends_at
            FROM event_registrations r
            JOIN events e ON e.id = r.event_id
            WHERE r.user_id = $1 AND r.status IN ('registered', 'attended') AND e.status <> 'cancelled'
            ORDER BY e.starts_at ASC
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registrations)
    }
}
