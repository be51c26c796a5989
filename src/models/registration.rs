//! Event registration and attendance models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "registration_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
    Cancelled,
    Attended,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Attended => "attended",
        }
    }

    /// Registered and attended rows occupy a place in the event
    pub fn is_active(&self) -> bool {
        !matches!(self, RegistrationStatus::Cancelled)
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventRegistration {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub status: RegistrationStatus,
    /// Rotated on every (re)activation, bound into the ticket
    pub ticket_nonce: Uuid,
    pub registered_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub attended_at: Option<DateTime<Utc>>,
}

/// Registration joined with the participant, for organizer listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParticipantEntry {
    pub registration_id: i64,
    pub user_id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    pub attended_at: Option<DateTime<Utc>>,
}

impl ParticipantEntry {
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .or_else(|| self.first_name.clone())
            .or_else(|| self.username.clone().map(|u| format!("@{}", u)))
            .unwrap_or_else(|| format!("#{}", self.telegram_id))
    }
}

/// A user's registration joined with its event, for "my tickets"
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RegisteredEvent {
    pub registration_id: i64,
    pub status: RegistrationStatus,
    pub event_id: i64,
    pub title: String,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceLog {
    pub id: i64,
    pub registration_id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub scanned_by: i64,
    pub checked_in_at: DateTime<Utc>,
}

/// Result of a valid scan
#[derive(Debug, Clone)]
pub enum CheckInOutcome {
    CheckedIn(AttendanceLog),
    AlreadyCheckedIn(AttendanceLog),
}

impl CheckInOutcome {
    pub fn log(&self) -> &AttendanceLog {
        match self {
            CheckInOutcome::CheckedIn(log) | CheckInOutcome::AlreadyCheckedIn(log) => log,
        }
    }

    pub fn is_first_scan(&self) -> bool {
        matches!(self, CheckInOutcome::CheckedIn(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_statuses() {
        assert!(RegistrationStatus::Registered.is_active());
        assert!(RegistrationStatus::Attended.is_active());
        assert!(!RegistrationStatus::Cancelled.is_active());
    }
}
