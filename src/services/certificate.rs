//! Certificates of attendance

use tracing::info;
use crate::config::CertificateConfig;
use crate::database::DatabaseService;
use crate::models::{Certificate, CertificateSummary, Event, EventRegistration, RegistrationStatus, User};
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::helpers::{format_timestamp, sanitize_filename};
use uuid::Uuid;

/// A certificate and its rendered document
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub certificate: Certificate,
    pub newly_issued: bool,
    pub file_name: String,
    pub document: String,
}

/// A certificate found by its verification code
#[derive(Debug, Clone)]
pub struct VerifiedCertificate {
    pub certificate: Certificate,
    pub holder_name: String,
    pub event_title: String,
    pub event_starts_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone)]
pub struct CertificateService {
    db: DatabaseService,
    config: CertificateConfig,
}

impl CertificateService {
    pub fn new(db: DatabaseService, config: CertificateConfig) -> Self {
        Self { db, config }
    }

    /// Issue (or re-render) the certificate of an attended registration
    pub async fn issue_for_registration(&self, registration_id: i64) -> Result<(IssuedCertificate, User)> {
        let registration = self
            .db
            .registrations
            .find_by_id(registration_id)
            .await?
            .ok_or(EventDeskError::RegistrationNotFound { registration_id })?;
        ensure_attended(&registration)?;

        let event = self
            .db
            .events
            .find_by_id(registration.event_id)
            .await?
            .ok_or(EventDeskError::EventNotFound { event_id: registration.event_id })?;
        let user = self
            .db
            .users
            .find_by_id(registration.user_id)
            .await?
            .ok_or(EventDeskError::UserNotFound { user_id: registration.user_id })?;

        let (certificate, newly_issued) = self
            .db
            .certificates
            .issue(registration.id, event.id, user.id)
            .await?;

        if newly_issued {
            info!(
                certificate = %certificate.certificate_number,
                event_id = event.id,
                user_id = user.id,
                "Certificate issued"
            );
        }

        let issued = IssuedCertificate {
            file_name: format!("{}.txt", sanitize_filename(&certificate.certificate_number)),
            document: self.render(&certificate, &event, &user),
            certificate,
            newly_issued,
        };
        Ok((issued, user))
    }

    pub async fn list_for_user(&self, user: &User) -> Result<Vec<CertificateSummary>> {
        self.db.certificates.list_for_user(user.id).await
    }

    /// Look up the certificate carrying `code`
    pub async fn verify(&self, code: &str) -> Result<Option<VerifiedCertificate>> {
        let code = Uuid::parse_str(code.trim())
            .map_err(|_| EventDeskError::InvalidInput(format!("Malformed verification code: {}", code.trim())))?;

        let Some(certificate) = self.db.certificates.find_by_verification_code(code).await? else {
            return Ok(None);
        };
        let event = self
            .db
            .events
            .find_by_id(certificate.event_id)
            .await?
            .ok_or(EventDeskError::EventNotFound { event_id: certificate.event_id })?;
        let holder = self
            .db
            .users
            .find_by_id(certificate.user_id)
            .await?
            .ok_or(EventDeskError::UserNotFound { user_id: certificate.user_id })?;

        Ok(Some(VerifiedCertificate {
            holder_name: holder.display_name(),
            event_title: event.title,
            event_starts_at: event.starts_at,
            certificate,
        }))
    }

    pub fn render(&self, certificate: &Certificate, event: &Event, user: &User) -> String {
        render_certificate(&self.config, certificate, event, user)
    }
}

/// Public verification link, when configured
pub fn verification_url(config: &CertificateConfig, certificate: &Certificate) -> Option<String> {
    let base = config.verify_base_url.as_deref()?;
    let mut url = url::Url::parse(base).ok()?;
    url.query_pairs_mut()
        .append_pair("code", &certificate.verification_code.to_string());
    Some(url.to_string())
}

/// Plain-text certificate document
pub fn render_certificate(config: &CertificateConfig, certificate: &Certificate, event: &Event, user: &User) -> String {
    let mut lines = vec![
        "CERTIFICATE OF ATTENDANCE".to_string(),
        String::new(),
        format!("This certifies that {}", user.display_name()),
        format!("attended \"{}\"", event.title),
    ];
    if let Some(venue) = &event.venue {
        lines.push(format!("at {}", venue));
    }
    lines.extend([
        format!("on {}", format_timestamp(event.starts_at)),
        String::new(),
        format!("Certificate No. {}", certificate.certificate_number),
        format!("Verification code: {}", certificate.verification_code),
        format!("Verify in the bot: /verify {}", certificate.verification_code),
    ]);
    if let Some(url) = verification_url(config, certificate) {
        lines.push(format!("Verify at: {}", url));
    }
    lines.extend([
        String::new(),
        format!("Issued by {} on {}", config.issuer_name, format_timestamp(certificate.issued_at)),
    ]);
    lines.join("\n")
}

fn ensure_attended(registration: &EventRegistration) -> Result<()> {
    if registration.status != RegistrationStatus::Attended {
        return Err(EventDeskError::InvalidStateTransition {
            from: registration.status.to_string(),
            to: "certified".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventStatus, UserRole};
    use chrono::{Duration, Utc};

    fn fixtures() -> (Certificate, Event, User) {
        let now = Utc::now();
        let certificate = Certificate {
            id: 1,
            registration_id: 2,
            event_id: 42,
            user_id: 3,
            sequence_number: 7,
            certificate_number: Certificate::format_number(42, 7),
            verification_code: Uuid::nil(),
            issued_at: now,
        };
        let event = Event {
            id: 42,
            title: "Async Rust".to_string(),
            description: None,
            venue: Some("Hall B".to_string()),
            starts_at: now - Duration::hours(3),
            ends_at: now - Duration::hours(1),
            max_participants: None,
            current_participants: 5,
            status: EventStatus::Published,
            certificates_issued: 7,
            created_by: 1,
            created_at: now,
            updated_at: now,
        };
        let user = User {
            id: 3,
            telegram_id: 300,
            username: None,
            first_name: Some("Grace".to_string()),
            last_name: None,
            full_name: Some("Grace Hopper".to_string()),
            language_code: "en".to_string(),
            role: UserRole::Participant,
            is_banned: false,
            created_at: now,
            updated_at: now,
        };
        (certificate, event, user)
    }

    fn config(verify_base_url: Option<&str>) -> CertificateConfig {
        CertificateConfig {
            issuer_name: "EventDesk".to_string(),
            verify_base_url: verify_base_url.map(str::to_string),
        }
    }

    #[test]
    fn test_render_contains_identity() {
        let (certificate, event, user) = fixtures();
        let rendered = render_with(config(None), &certificate, &event, &user);
        assert!(rendered.contains("Grace Hopper"));
        assert!(rendered.contains("\"Async Rust\""));
        assert!(rendered.contains("at Hall B"));
        assert!(rendered.contains("CERT-00042-0007"));
        assert!(!rendered.contains("Verify at"));
        assert!(rendered.contains("/verify 00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_verification_url() {
        let (certificate, event, user) = fixtures();
        let rendered = render_with(config(Some("https://example.org/verify")), &certificate, &event, &user);
        assert!(rendered.contains(
            "Verify at: https://example.org/verify?code=00000000-0000-0000-0000-000000000000"
        ));
    }

    fn render_with(config: CertificateConfig, certificate: &Certificate, event: &Event, user: &User) -> String {
        render_certificate(&config, certificate, event, user)
    }
}
