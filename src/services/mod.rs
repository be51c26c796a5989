//! Services module
//!
//! This module contains business logic services

pub mod analytics;
pub mod auth;
pub mod certificate;
pub mod checkin;
pub mod event;
pub mod notification;
pub mod redis;
pub mod survey;
pub mod ticket;
pub mod user;

// Re-export commonly used services
pub use analytics::AnalyticsService;
pub use auth::AuthService;
pub use certificate::{CertificateService, IssuedCertificate, VerifiedCertificate};
pub use checkin::{CheckInResult, CheckInService};
pub use event::{EventDraft, EventService};
pub use notification::{BulkOutcome, NotificationService};
pub use redis::RedisService;
pub use survey::SurveyService;
pub use ticket::{TicketClaims, TicketService};
pub use user::UserService;

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::i18n::I18n;
use crate::jobs::JobQueue;
use teloxide::Bot;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub database: DatabaseService,
    pub job_queue: JobQueue,
    pub user_service: UserService,
    pub auth_service: AuthService,
    pub event_service: EventService,
    pub ticket_service: TicketService,
    pub checkin_service: CheckInService,
    pub certificate_service: CertificateService,
    pub survey_service: SurveyService,
    pub analytics_service: AnalyticsService,
    pub notification_service: NotificationService,
    pub redis_service: RedisService,
}

impl ServiceFactory {
    /// Wire every service around one database handle and Redis connection
    pub fn new(bot: Bot, settings: Settings, database: DatabaseService, redis_service: RedisService, i18n: I18n) -> Self {
        let job_queue = JobQueue::new(database.jobs.clone(), &settings.jobs);
        let auth_service = AuthService::new(&settings);
        let user_service = UserService::new(database.users.clone(), settings.clone());
        let ticket_service = TicketService::new(&settings.tickets);
        let event_service = EventService::new(
            database.clone(),
            auth_service.clone(),
            job_queue.clone(),
            settings.clone(),
        );
        let checkin_service = CheckInService::new(
            database.clone(),
            auth_service.clone(),
            ticket_service.clone(),
            job_queue.clone(),
            settings.clone(),
        );
        let certificate_service = CertificateService::new(database.clone(), settings.certificates.clone());
        let survey_service = SurveyService::new(database.clone());
        let analytics_service = AnalyticsService::new(database.clone(), redis_service.clone());
        let notification_service = NotificationService::new(bot, i18n, settings);

        Self {
            database,
            job_queue,
            user_service,
            auth_service,
            event_service,
            ticket_service,
            checkin_service,
            certificate_service,
            survey_service,
            analytics_service,
            notification_service,
            redis_service,
        }
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        ServiceHealthStatus {
            database_healthy: self.database.health_check().await.is_ok(),
            redis_healthy: self.redis_service.health_check().await,
        }
    }
}

/// Health status for external dependencies
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    pub redis_healthy: bool,
}

impl ServiceHealthStatus {
    /// Redis only backs caches and conversation state; the database is required
    pub fn is_healthy(&self) -> bool {
        self.database_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push("Database connection failed".to_string());
        }
        if !self.redis_healthy {
            issues.push("Redis connection failed".to_string());
        }

        issues
    }
}
