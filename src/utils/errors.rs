//! Error handling for EventDesk
//!
//! This module defines the main error type used throughout the application.
//! Domain failures carry enough context for handlers to pick a translated
//! message via [`EventDeskError::user_message_key`].

use thiserror::Error;

/// Main error type for EventDesk application
#[derive(Error, Debug)]
pub enum EventDeskError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("User is banned: {user_id}")]
    UserBanned { user_id: i64 },

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },

    #[error("Event {event_id} is not open for registration (status: {status})")]
    EventNotOpen { event_id: i64, status: String },

    #[error("Event {event_id} is full ({capacity} participants)")]
    EventFull { event_id: i64, capacity: i32 },

    #[error("User {user_id} is already registered for event {event_id}")]
    AlreadyRegistered { event_id: i64, user_id: i64 },

    #[error("User {user_id} is not registered for event {event_id}")]
    NotRegistered { event_id: i64, user_id: i64 },

    #[error("Registration not found: {registration_id}")]
    RegistrationNotFound { registration_id: i64 },

    #[error("Invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("Ticket does not belong to event {expected_event_id}")]
    TicketMismatch { expected_event_id: i64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("QR code error: {0}")]
    QrCode(String),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type alias for EventDesk operations
pub type Result<T> = std::result::Result<T, EventDeskError>;

impl From<qrcode::types::QrError> for EventDeskError {
    fn from(err: qrcode::types::QrError) -> Self {
        EventDeskError::QrCode(err.to_string())
    }
}

impl EventDeskError {
    /// Check if the error is recoverable
    ///
    /// The job poller retries recoverable failures with backoff and gives up
    /// immediately on the rest.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EventDeskError::Database(_) => true,
            EventDeskError::Migration(_) => false,
            EventDeskError::Telegram(_) => true,
            EventDeskError::Config(_) => false,
            EventDeskError::PermissionDenied(_) => false,
            EventDeskError::UserNotFound { .. } => false,
            EventDeskError::UserBanned { .. } => false,
            EventDeskError::EventNotFound { .. } => false,
            EventDeskError::EventNotOpen { .. } => false,
            EventDeskError::EventFull { .. } => false,
            EventDeskError::AlreadyRegistered { .. } => false,
            EventDeskError::NotRegistered { .. } => false,
            EventDeskError::RegistrationNotFound { .. } => false,
            EventDeskError::InvalidTicket(_) => false,
            EventDeskError::TicketMismatch { .. } => false,
            EventDeskError::InvalidStateTransition { .. } => false,
            EventDeskError::Redis(_) => true,
            EventDeskError::Serialization(_) => false,
            EventDeskError::Io(_) => true,
            EventDeskError::UrlParse(_) => false,
            EventDeskError::QrCode(_) => false,
            EventDeskError::Image(_) => false,
            EventDeskError::RateLimitExceeded => true,
            EventDeskError::InvalidInput(_) => false,
            EventDeskError::ServiceUnavailable(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EventDeskError::Database(_) => ErrorSeverity::Critical,
            EventDeskError::Migration(_) => ErrorSeverity::Critical,
            EventDeskError::Config(_) => ErrorSeverity::Critical,
            EventDeskError::PermissionDenied(_) => ErrorSeverity::Warning,
            EventDeskError::UserBanned { .. } => ErrorSeverity::Warning,
            EventDeskError::InvalidTicket(_) => ErrorSeverity::Warning,
            EventDeskError::TicketMismatch { .. } => ErrorSeverity::Warning,
            EventDeskError::RateLimitExceeded => ErrorSeverity::Warning,
            EventDeskError::InvalidInput(_)
            | EventDeskError::EventNotFound { .. }
            | EventDeskError::EventNotOpen { .. }
            | EventDeskError::EventFull { .. }
            | EventDeskError::AlreadyRegistered { .. }
            | EventDeskError::NotRegistered { .. }
            | EventDeskError::RegistrationNotFound { .. }
            | EventDeskError::UserNotFound { .. }
            | EventDeskError::InvalidStateTransition { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// Translation key shown to the user for this error
    pub fn user_message_key(&self) -> &'static str {
        match self {
            EventDeskError::PermissionDenied(_) => "errors.permission_denied",
            EventDeskError::UserNotFound { .. } => "errors.user_not_found",
            EventDeskError::UserBanned { .. } => "errors.user_banned",
            EventDeskError::EventNotFound { .. } => "errors.event_not_found",
            EventDeskError::EventNotOpen { .. } => "errors.event_not_open",
            EventDeskError::EventFull { .. } => "errors.event_full",
            EventDeskError::AlreadyRegistered { .. } => "errors.already_registered",
            EventDeskError::NotRegistered { .. } => "errors.not_registered",
            EventDeskError::RegistrationNotFound { .. } => "errors.not_registered",
            EventDeskError::InvalidTicket(_) => "errors.invalid_ticket",
            EventDeskError::TicketMismatch { .. } => "errors.ticket_mismatch",
            EventDeskError::InvalidStateTransition { .. } => "errors.invalid_state",
            EventDeskError::RateLimitExceeded => "errors.rate_limited",
            EventDeskError::InvalidInput(_) => "errors.invalid_input",
            _ => "errors.generic",
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_specific_messages() {
        let full = EventDeskError::EventFull { event_id: 1, capacity: 10 };
        assert_eq!(full.user_message_key(), "errors.event_full");
        assert_eq!(full.severity(), ErrorSeverity::Info);
        assert!(!full.is_recoverable());

        let ticket = EventDeskError::InvalidTicket("expired".to_string());
        assert_eq!(ticket.user_message_key(), "errors.invalid_ticket");
        assert_eq!(ticket.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_infrastructure_errors_are_generic_and_recoverable() {
        let err = EventDeskError::ServiceUnavailable("telegram".to_string());
        assert_eq!(err.user_message_key(), "errors.generic");
        assert!(err.is_recoverable());
        assert_eq!(EventDeskError::Config("x".into()).severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = EventDeskError::AlreadyRegistered { event_id: 7, user_id: 3 };
        assert_eq!(err.to_string(), "User 3 is already registered for event 7");
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }
}
