//! QR check-in
//!
//! Verifies a scanned ticket against the event being scanned and the current
//! registration row, then records attendance exactly once.

use tracing::warn;
use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::jobs::JobQueue;
use crate::models::{CheckInOutcome, Event, EventRegistration, EventStatus, JobPayload, User};
use crate::services::auth::AuthService;
use crate::services::ticket::{TicketClaims, TicketService};
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::logging::log_checkin;

/// A successful scan with the data needed to greet the attendee
#[derive(Debug, Clone)]
pub struct CheckInResult {
    pub outcome: CheckInOutcome,
    pub attendee: User,
    pub event: Event,
}

#[derive(Clone)]
pub struct CheckInService {
    db: DatabaseService,
    auth: AuthService,
    tickets: TicketService,
    jobs: JobQueue,
    settings: Settings,
}

impl CheckInService {
    pub fn new(db: DatabaseService, auth: AuthService, tickets: TicketService, jobs: JobQueue, settings: Settings) -> Self {
        Self { db, auth, tickets, jobs, settings }
    }

    /// Scanner must own the event or be an admin
    pub async fn authorize_scanner(&self, scanner: &User, event_id: i64) -> Result<Event> {
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(EventDeskError::EventNotFound { event_id })?;
        self.auth.require_event_manager(scanner, &event)?;
        Ok(event)
    }

    /// Verify a scanned payload and record attendance
    pub async fn check_in(&self, scanner: &User, event_id: i64, payload: &str) -> Result<CheckInResult> {
        let event = self.authorize_scanner(scanner, event_id).await?;

        let claims = self.tickets.verify(payload)?;
        let registration = self.resolve_registration(&event, &claims).await?;

        if event.status != EventStatus::Published {
            return Err(EventDeskError::EventNotOpen {
                event_id,
                status: event.status.to_string(),
            });
        }

        let outcome = self
            .db
            .attendance
            .check_in(registration.id, event.id, registration.user_id, scanner.id)
            .await?;
        log_checkin(event.id, registration.id, scanner.id, outcome.is_first_scan());

        if outcome.is_first_scan() {
            self.schedule_follow_ups(&event, registration.id).await;
        }

        let attendee = self
            .db
            .users
            .find_by_id(registration.user_id)
            .await?
            .ok_or(EventDeskError::UserNotFound { user_id: registration.user_id })?;

        Ok(CheckInResult { outcome, attendee, event })
    }

    /// Match verified claims against the stored registration
    async fn resolve_registration(&self, event: &Event, claims: &TicketClaims) -> Result<EventRegistration> {
        if claims.evt != event.id {
            return Err(EventDeskError::TicketMismatch { expected_event_id: event.id });
        }

        let registration = self
            .db
            .registrations
            .find_by_id(claims.reg)
            .await?
            .ok_or_else(|| EventDeskError::InvalidTicket("unknown registration".to_string()))?;

        if registration.event_id != event.id || registration.user_id != claims.user_id()? {
            return Err(EventDeskError::InvalidTicket("registration does not match ticket".to_string()));
        }
        if registration.ticket_nonce != claims.jti {
            return Err(EventDeskError::InvalidTicket("ticket was superseded".to_string()));
        }
        if !registration.status.is_active() {
            return Err(EventDeskError::NotRegistered {
                event_id: event.id,
                user_id: registration.user_id,
            });
        }

        Ok(registration)
    }

    async fn schedule_follow_ups(&self, event: &Event, registration_id: i64) {
        let mut follow_ups = Vec::new();
        if self.settings.features.certificates {
            follow_ups.push(JobPayload::GenerateCertificate { registration_id });
        }
        if self.settings.features.surveys {
            follow_ups.push(JobPayload::SendSurvey { registration_id });
        }

        for payload in follow_ups {
            let kind = payload.kind();
            if let Err(e) = self.jobs.enqueue_at(payload, event.ends_at).await {
                warn!(registration_id = registration_id, kind = kind, error = %e, "Failed to schedule post-event job");
            }
        }
    }
}
