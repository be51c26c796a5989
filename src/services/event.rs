//! Event service
//!
//! Event CRUD, lifecycle transitions and registration counting. All
//! capacity decisions are made by the database inside the registration
//! transaction; this layer only authorizes, validates and schedules the
//! follow-up jobs.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::jobs::JobQueue;
use crate::models::{
    CreateEventRequest, Event, EventRegistration, EventStatus, JobPayload, ParticipantEntry,
    RegisteredEvent, UpdateEventRequest, User,
};
use crate::services::auth::AuthService;
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::logging::{log_event_action, log_user_action};

pub const MIN_TITLE_CHARS: usize = 3;
pub const MAX_TITLE_CHARS: usize = 200;
const UPCOMING_LIMIT: i64 = 20;

/// Input for a new event
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_participants: Option<i32>,
}

#[derive(Clone)]
pub struct EventService {
    db: DatabaseService,
    auth: AuthService,
    jobs: JobQueue,
    settings: Settings,
}

impl EventService {
    pub fn new(db: DatabaseService, auth: AuthService, jobs: JobQueue, settings: Settings) -> Self {
        Self { db, auth, jobs, settings }
    }

    /// Create an event in draft status
    pub async fn create_event(&self, organizer: &User, draft: EventDraft) -> Result<Event> {
        self.auth.require_organizer(organizer)?;

        let title = validate_title(&draft.title)?;
        validate_schedule(draft.starts_at, draft.ends_at)?;
        if draft.starts_at <= Utc::now() {
            return Err(EventDeskError::InvalidInput("Event must start in the future".to_string()));
        }
        validate_capacity(draft.max_participants)?;

        let event = self
            .db
            .events
            .create(CreateEventRequest {
                title,
                description: draft.description.filter(|d| !d.trim().is_empty()),
                venue: draft.venue.filter(|v| !v.trim().is_empty()),
                starts_at: draft.starts_at,
                ends_at: draft.ends_at,
                max_participants: draft.max_participants,
                created_by: organizer.id,
            })
            .await?;

        log_event_action(event.id, "create", organizer.id, None);
        Ok(event)
    }

    pub async fn get_event(&self, event_id: i64) -> Result<Event> {
        self.db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(EventDeskError::EventNotFound { event_id })
    }

    /// Load an event the actor is allowed to manage
    pub async fn get_managed_event(&self, actor: &User, event_id: i64) -> Result<Event> {
        let event = self.get_event(event_id).await?;
        self.auth.require_event_manager(actor, &event)?;
        Ok(event)
    }

    /// Full-record update of a non-cancelled event
    pub async fn update_event(&self, actor: &User, event_id: i64, request: UpdateEventRequest) -> Result<Event> {
        let current = self.get_managed_event(actor, event_id).await?;
        if current.status == EventStatus::Cancelled {
            return Err(EventDeskError::InvalidStateTransition {
                from: current.status.to_string(),
                to: "updated".to_string(),
            });
        }

        let request = UpdateEventRequest {
            title: request.title.as_deref().map(validate_title).transpose()?,
            ..request
        };
        validate_schedule(
            request.starts_at.unwrap_or(current.starts_at),
            request.ends_at.unwrap_or(current.ends_at),
        )?;
        validate_capacity(request.max_participants)?;

        match self.db.events.update(event_id, request.clone()).await? {
            Some(event) => {
                log_event_action(event_id, "update", actor.id, None);
                if let Err(e) = self.reschedule_jobs(&current, &event).await {
                    warn!(event_id = event_id, error = %e, "Failed to move scheduled jobs");
                }
                Ok(event)
            }
            None => {
                // Re-read to tell which guard refused the update
                let event = self.get_event(event_id).await?;
                if event.status == EventStatus::Cancelled {
                    return Err(EventDeskError::InvalidStateTransition {
                        from: event.status.to_string(),
                        to: "updated".to_string(),
                    });
                }
                Err(EventDeskError::InvalidInput(format!(
                    "Capacity {} is below the {} places already taken",
                    request.max_participants.unwrap_or_default(),
                    event.current_participants
                )))
            }
        }
    }

    pub async fn publish_event(&self, actor: &User, event_id: i64) -> Result<Event> {
        let event = self.transition(actor, event_id, EventStatus::Published).await?;
        log_event_action(event_id, "publish", actor.id, None);
        Ok(event)
    }

    /// Soft-cancel an event and notify everyone holding a place
    pub async fn cancel_event(&self, actor: &User, event_id: i64) -> Result<Event> {
        let event = self.transition(actor, event_id, EventStatus::Cancelled).await?;
        log_event_action(event_id, "cancel", actor.id, None);

        let registrations = self.db.registrations.list_active(event_id).await?;
        for registration in &registrations {
            let payload = JobPayload::SendNotification {
                user_id: registration.user_id,
                message_key: "notifications.event_cancelled".to_string(),
                params: [("title".to_string(), event.title.clone())].into_iter().collect(),
            };
            if let Err(e) = self.jobs.enqueue_now(payload).await {
                warn!(event_id = event_id, user_id = registration.user_id, error = %e, "Failed to enqueue cancellation notice");
            }
        }

        info!(event_id = event_id, notified = registrations.len(), "Event cancelled");
        Ok(event)
    }

    /// Delete an event that was never published
    pub async fn delete_event(&self, actor: &User, event_id: i64) -> Result<()> {
        let event = self.get_managed_event(actor, event_id).await?;
        if event.status != EventStatus::Draft || !self.db.events.delete_draft(event_id).await? {
            return Err(EventDeskError::InvalidStateTransition {
                from: event.status.to_string(),
                to: "deleted".to_string(),
            });
        }

        log_event_action(event_id, "delete", actor.id, None);
        Ok(())
    }

    async fn transition(&self, actor: &User, event_id: i64, to: EventStatus) -> Result<Event> {
        let event = self.get_managed_event(actor, event_id).await?;
        if !event.status.can_transition_to(to) {
            return Err(EventDeskError::InvalidStateTransition {
                from: event.status.to_string(),
                to: to.to_string(),
            });
        }

        self.db
            .events
            .transition_status(event_id, event.status, to)
            .await?
            .ok_or_else(|| EventDeskError::InvalidStateTransition {
                from: event.status.to_string(),
                to: to.to_string(),
            })
    }

    pub async fn list_upcoming(&self) -> Result<Vec<Event>> {
        self.db.events.list_upcoming(UPCOMING_LIMIT).await
    }

    pub async fn list_by_organizer(&self, organizer: &User) -> Result<Vec<Event>> {
        self.db.events.list_by_organizer(organizer.id).await
    }

    pub async fn list_participants(&self, actor: &User, event_id: i64) -> Result<(Event, Vec<ParticipantEntry>)> {
        let event = self.get_managed_event(actor, event_id).await?;
        let participants = self.db.events.list_participants(event_id).await?;
        Ok((event, participants))
    }

    pub async fn user_registrations(&self, user: &User) -> Result<Vec<RegisteredEvent>> {
        self.db.registrations.list_for_user(user.id).await
    }

    /// Register a user, taking one place if any is left
    pub async fn register(&self, user: &User, event_id: i64) -> Result<(EventRegistration, Event)> {
        self.auth.require_active(user)?;

        let (registration, event) = self.db.registrations.register(event_id, user.id).await?;
        log_user_action(user.id, "register", Some(&format!("event={} registration={}", event_id, registration.id)));

        self.schedule_reminder(&event).await;
        Ok((registration, event))
    }

    fn reminder_at(&self, event: &Event) -> DateTime<Utc> {
        event.starts_at - Duration::hours(self.settings.jobs.reminder_hours_before)
    }

    /// Queue the event's reminder unless it is already queued or too late
    async fn schedule_reminder(&self, event: &Event) {
        if !self.settings.features.event_reminders {
            return;
        }

        let reminder_at = self.reminder_at(event);
        if reminder_at > Utc::now() {
            if let Err(e) = self
                .jobs
                .enqueue_at(JobPayload::EventReminder { event_id: event.id }, reminder_at)
                .await
            {
                warn!(event_id = event.id, error = %e, "Failed to schedule event reminder");
            }
        }
    }

    /// Keep pending reminder and post-event jobs in step with a changed schedule
    async fn reschedule_jobs(&self, before: &Event, after: &Event) -> Result<()> {
        let repository = self.jobs.repository();

        if after.starts_at != before.starts_at && self.settings.features.event_reminders {
            let reminder_key = JobPayload::EventReminder { event_id: after.id }.dedup_key();
            let run_at = self.reminder_at(after).max(Utc::now());
            let moved = match reminder_key {
                Some(key) => repository.reschedule_pending(&key, run_at).await?,
                None => false,
            };
            if !moved && after.current_participants > 0 {
                self.schedule_reminder(after).await;
            }
            debug!(event_id = after.id, run_at = %run_at, moved = moved, "Reminder rescheduled");
        }

        if after.ends_at != before.ends_at {
            let moved = repository.reschedule_follow_ups(after.id, after.ends_at).await?;
            debug!(event_id = after.id, moved = moved, "Post-event jobs rescheduled");
        }

        Ok(())
    }

    /// Give the place back; attended registrations stay
    pub async fn cancel_registration(&self, user: &User, event_id: i64) -> Result<EventRegistration> {
        let registration = self.db.registrations.cancel(event_id, user.id).await?;
        log_user_action(user.id, "unregister", Some(&format!("event={}", event_id)));
        Ok(registration)
    }

    /// Recompute the participant counter from the registration rows
    pub async fn recount_participants(&self, actor: &User, event_id: i64) -> Result<i32> {
        self.get_managed_event(actor, event_id).await?;
        let count = self.db.registrations.recount_participants(event_id).await?;
        log_event_action(event_id, "recount", actor.id, Some(&count.to_string()));
        Ok(count)
    }
}

pub fn validate_title(title: &str) -> Result<String> {
    let title = crate::utils::helpers::normalize_whitespace(title);
    let length = title.chars().count();
    if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&length) {
        return Err(EventDeskError::InvalidInput(format!(
            "Title must be between {} and {} characters",
            MIN_TITLE_CHARS, MAX_TITLE_CHARS
        )));
    }
    Ok(title)
}

pub fn validate_schedule(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<()> {
    if ends_at <= starts_at {
        return Err(EventDeskError::InvalidInput("Event must end after it starts".to_string()));
    }
    Ok(())
}

pub fn validate_capacity(max_participants: Option<i32>) -> Result<()> {
    match max_participants {
        Some(max) if max < 1 => Err(EventDeskError::InvalidInput(
            "Capacity must be at least 1".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Rust   meetup ").unwrap(), "Rust meetup");
        assert!(validate_title("ab").is_err());
        assert!(validate_title(&"a".repeat(MAX_TITLE_CHARS + 1)).is_err());
    }

    #[test]
    fn test_validate_schedule() {
        let start = Utc::now();
        assert!(validate_schedule(start, start + Duration::hours(1)).is_ok());
        assert!(validate_schedule(start, start).is_err());
        assert!(validate_schedule(start, start - Duration::minutes(1)).is_err());
    }

    #[test]
    fn test_validate_capacity() {
        assert!(validate_capacity(None).is_ok());
        assert!(validate_capacity(Some(1)).is_ok());
        assert!(validate_capacity(Some(0)).is_err());
        assert!(validate_capacity(Some(-4)).is_err());
    }
}
