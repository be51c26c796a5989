//! Event model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Cancelled => "cancelled",
        }
    }

    /// Allowed lifecycle moves; cancelled is terminal
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Draft, EventStatus::Published)
                | (EventStatus::Draft, EventStatus::Cancelled)
                | (EventStatus::Published, EventStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// `None` means unlimited capacity
    pub max_participants: Option<i32>,
    pub current_participants: i32,
    pub status: EventStatus,
    pub certificates_issued: i32,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why an event does or does not accept a new registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationEligibility {
    Open,
    NotPublished(EventStatus),
    Ended,
    Full(i32),
}

impl Event {
    pub fn remaining_places(&self) -> Option<i32> {
        self.max_participants
            .map(|max| (max - self.current_participants).max(0))
    }

    pub fn is_full(&self) -> bool {
        matches!(self.max_participants, Some(max) if self.current_participants >= max)
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }

    /// Mirrors the guard of the conditional increment used when registering
    pub fn registration_eligibility(&self, now: DateTime<Utc>) -> RegistrationEligibility {
        if self.status != EventStatus::Published {
            return RegistrationEligibility::NotPublished(self.status);
        }
        if self.has_ended(now) {
            return RegistrationEligibility::Ended;
        }
        match self.max_participants {
            Some(max) if self.current_participants >= max => RegistrationEligibility::Full(max),
            _ => RegistrationEligibility::Open,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_participants: Option<i32>,
    pub created_by: i64,
}

/// Full-record update; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub max_participants: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(status: EventStatus, max: Option<i32>, current: i32) -> Event {
        let now = Utc::now();
        Event {
            id: 1,
            title: "Rust meetup".to_string(),
            description: None,
            venue: None,
            starts_at: now + Duration::days(1),
            ends_at: now + Duration::days(1) + Duration::hours(2),
            max_participants: max,
            current_participants: current,
            status,
            certificates_issued: 0,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(EventStatus::Draft.can_transition_to(EventStatus::Published));
        assert!(EventStatus::Draft.can_transition_to(EventStatus::Cancelled));
        assert!(EventStatus::Published.can_transition_to(EventStatus::Cancelled));
        assert!(!EventStatus::Published.can_transition_to(EventStatus::Draft));
        assert!(!EventStatus::Cancelled.can_transition_to(EventStatus::Published));
        assert!(!EventStatus::Cancelled.can_transition_to(EventStatus::Draft));
    }

    #[test]
    fn test_eligibility() {
        let now = Utc::now();
        assert_eq!(
            event(EventStatus::Published, Some(2), 1).registration_eligibility(now),
            RegistrationEligibility::Open
        );
        assert_eq!(
            event(EventStatus::Published, Some(2), 2).registration_eligibility(now),
            RegistrationEligibility::Full(2)
        );
        assert_eq!(
            event(EventStatus::Published, None, 10_000).registration_eligibility(now),
            RegistrationEligibility::Open
        );
        assert_eq!(
            event(EventStatus::Draft, None, 0).registration_eligibility(now),
            RegistrationEligibility::NotPublished(EventStatus::Draft)
        );

        let mut past = event(EventStatus::Published, None, 0);
        past.ends_at = now - Duration::minutes(1);
        assert_eq!(past.registration_eligibility(now), RegistrationEligibility::Ended);
    }

    #[test]
    fn test_remaining_places() {
        assert_eq!(event(EventStatus::Published, Some(5), 3).remaining_places(), Some(2));
        assert_eq!(event(EventStatus::Published, None, 3).remaining_places(), None);
        assert!(event(EventStatus::Published, Some(3), 3).is_full());
    }
}
