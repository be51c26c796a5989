//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod user;
pub mod event;
pub mod registration;
pub mod certificate;
pub mod job;
pub mod analytics;

// Re-export commonly used models
pub use user::{User, UserRole, CreateUserRequest, UpdateUserRequest};
pub use event::{Event, EventStatus, RegistrationEligibility, CreateEventRequest, UpdateEventRequest};
pub use registration::{EventRegistration, RegistrationStatus, ParticipantEntry, RegisteredEvent, AttendanceLog, CheckInOutcome};
pub use certificate::{Certificate, CertificateSummary, SurveyResponse, SurveySummary};
pub use job::{Job, JobStatus, JobPayload, NewJob, JobCounts};
pub use analytics::{PlatformOverview, EventStats, Dashboard};
