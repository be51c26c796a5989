//! Database repositories module
//! 
//! This module contains all repository implementations for data access

pub mod user;
pub mod event;
pub mod registration;
pub mod attendance;
pub mod certificate;
pub mod job;
pub mod analytics;

// Re-export repositories
pub use user::UserRepository;
pub use event::EventRepository;
pub use registration::RegistrationRepository;
pub use attendance::AttendanceRepository;
pub use certificate::{CertificateRepository, SurveyRepository};
pub use job::JobRepository;
pub use analytics::AnalyticsRepository;
