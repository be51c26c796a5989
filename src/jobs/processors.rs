//! Job processors
//!
//! Every processor must tolerate being run twice for the same job: a worker
//! that dies between sending and marking the job completed gets the job
//! re-delivered after the visibility timeout.

use chrono::Utc;
use futures::future::BoxFuture;
use teloxide::{ApiError, RequestError};
use tracing::{debug, info, warn};
use crate::i18n::params;
use crate::models::{EventStatus, Job, JobPayload, RegistrationStatus, User};
use crate::services::ServiceFactory;
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::helpers::{format_timestamp, truncate_text};

/// Executes one decoded job
pub trait JobHandler: Send + Sync + 'static {
    fn handle<'a>(&'a self, job: &'a Job, payload: JobPayload) -> BoxFuture<'a, Result<()>>;

    /// Called once a job has been moved to `failed`
    fn on_failed<'a>(&'a self, _job: &'a Job, _error: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

/// Production handler delivering work through the Telegram bot
#[derive(Clone)]
pub struct BotJobHandler {
    services: ServiceFactory,
}

impl BotJobHandler {
    pub fn new(services: ServiceFactory) -> Self {
        Self { services }
    }

    async fn send_notification(
        &self,
        user_id: i64,
        message_key: &str,
        message_params: &std::collections::HashMap<String, String>,
    ) -> Result<()> {
        let user = self.load_user(user_id).await?;
        let sent = self
            .services
            .notification_service
            .notify(&user, message_key, Some(message_params))
            .await;
        delivered(&user, sent.map(|_| ()))
    }

    async fn generate_certificate(&self, registration_id: i64) -> Result<()> {
        let (issued, user) = self
            .services
            .certificate_service
            .issue_for_registration(registration_id)
            .await?;

        let caption = self.services.notification_service.i18n().t(
            "certificates.issued",
            &user.language_code,
            Some(&params([("number", issued.certificate.certificate_number.clone())])),
        );
        let sent = self
            .services
            .notification_service
            .send_document(&user, issued.file_name, issued.document.into_bytes(), caption)
            .await;
        delivered(&user, sent.map(|_| ()))
    }

    async fn send_survey(&self, registration_id: i64) -> Result<()> {
        let db = &self.services.database;
        let registration = db
            .registrations
            .find_by_id(registration_id)
            .await?
            .ok_or(EventDeskError::RegistrationNotFound { registration_id })?;

        if registration.status != RegistrationStatus::Attended {
            debug!(registration_id = registration_id, "Registration no longer attended, skipping survey");
            return Ok(());
        }
        if db.surveys.find(registration.event_id, registration.user_id).await?.is_some() {
            debug!(registration_id = registration_id, "Survey already answered");
            return Ok(());
        }

        let event = self.services.event_service.get_event(registration.event_id).await?;
        let user = self.load_user(registration.user_id).await?;
        let sent = self.services.notification_service.send_survey(&user, &event).await;
        delivered(&user, sent.map(|_| ()))
    }

    async fn event_reminder(&self, event_id: i64) -> Result<()> {
        let event = self.services.event_service.get_event(event_id).await?;
        if event.status != EventStatus::Published || event.starts_at <= Utc::now() {
            info!(event_id = event_id, status = %event.status, "Event no longer upcoming, reminder dropped");
            return Ok(());
        }

        let db = &self.services.database;
        let mut recipients = Vec::new();
        for registration in db.registrations.list_active(event_id).await? {
            if let Some(user) = db.users.find_by_id(registration.user_id).await? {
                recipients.push(user);
            }
        }

        let reminder_params = params([
            ("title", event.title.clone()),
            ("starts_at", format_timestamp(event.starts_at)),
            ("venue", event.venue.clone().unwrap_or_default()),
        ]);
        let outcome = self
            .services
            .notification_service
            .notify_many(&recipients, "notifications.event_reminder", Some(&reminder_params))
            .await;

        info!(event_id = event_id, sent = outcome.sent, failed = outcome.failed, "Event reminder delivered");
        Ok(())
    }

    async fn load_user(&self, user_id: i64) -> Result<User> {
        self.services
            .database
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(EventDeskError::UserNotFound { user_id })
    }
}

impl JobHandler for BotJobHandler {
    fn handle<'a>(&'a self, job: &'a Job, payload: JobPayload) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            debug!(job_id = job.id, kind = %job.kind, attempt = job.attempts, "Processing job");
            match payload {
                JobPayload::SendNotification { user_id, message_key, params } => {
                    self.send_notification(user_id, &message_key, &params).await
                }
                JobPayload::GenerateCertificate { registration_id } => {
                    self.generate_certificate(registration_id).await
                }
                JobPayload::SendSurvey { registration_id } => self.send_survey(registration_id).await,
                JobPayload::EventReminder { event_id } => self.event_reminder(event_id).await,
            }
        })
    }

    fn on_failed<'a>(&'a self, job: &'a Job, error: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let text = format!(
                "⚠️ Job #{} ({}) failed after {} attempts:\n{}",
                job.id,
                job.kind,
                job.attempts,
                truncate_text(error, 300)
            );
            self.services.notification_service.notify_admins(&text).await;
        })
    }
}

/// A user who blocked the bot will never receive the message; retrying is pointless
fn delivered(user: &User, result: Result<()>) -> Result<()> {
    match result {
        Err(EventDeskError::Telegram(e)) if is_permanent_delivery_failure(&e) => {
            warn!(telegram_id = user.telegram_id, error = %e, "Recipient unreachable, dropping message");
            Ok(())
        }
        other => other,
    }
}

pub fn is_permanent_delivery_failure(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Api(ApiError::BotBlocked)
            | RequestError::Api(ApiError::UserDeactivated)
            | RequestError::Api(ApiError::ChatNotFound)
    )
}
