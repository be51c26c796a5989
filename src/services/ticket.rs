//! Check-in tickets
//!
//! A ticket is an HS256 JWT binding a registration to its event, user and
//! current `ticket_nonce`, rendered as a QR code PNG. Tickets expire a
//! configurable grace period after the event ends.

use std::io::Cursor;

use chrono::{Duration, Utc};
use image::{ImageFormat, Luma};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TicketConfig;
use crate::models::{Event, EventRegistration};
use crate::utils::errors::{EventDeskError, Result};

/// Claims carried by a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketClaims {
    /// Internal user id
    pub sub: String,
    pub evt: i64,
    pub reg: i64,
    /// Registration nonce at issue time
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl TicketClaims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| EventDeskError::InvalidTicket("malformed subject".to_string()))
    }
}

#[derive(Clone)]
pub struct TicketService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    grace: Duration,
    qr_size: u32,
}

impl TicketService {
    pub fn new(config: &TicketConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.signing_secret.as_bytes()),
            validation,
            grace: Duration::hours(config.validity_grace_hours),
            qr_size: config.qr_size,
        }
    }

    pub fn claims_for(&self, registration: &EventRegistration, event: &Event) -> TicketClaims {
        TicketClaims {
            sub: registration.user_id.to_string(),
            evt: event.id,
            reg: registration.id,
            jti: registration.ticket_nonce,
            iat: Utc::now().timestamp(),
            exp: (event.ends_at + self.grace).timestamp(),
        }
    }

    /// Sign a ticket for an active registration
    pub fn issue(&self, registration: &EventRegistration, event: &Event) -> Result<String> {
        if !registration.status.is_active() {
            return Err(EventDeskError::NotRegistered {
                event_id: event.id,
                user_id: registration.user_id,
            });
        }
        self.sign(&self.claims_for(registration, event))
    }

    pub fn sign(&self, claims: &TicketClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| EventDeskError::InvalidTicket(format!("failed to sign ticket: {}", e)))
    }

    /// Check signature and expiry of a scanned payload
    pub fn verify(&self, token: &str) -> Result<TicketClaims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(EventDeskError::InvalidTicket("empty payload".to_string()));
        }

        decode::<TicketClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "expired",
                    ErrorKind::InvalidSignature => "bad signature",
                    _ => "malformed",
                };
                EventDeskError::InvalidTicket(reason.to_string())
            })
    }

    /// Render a token as a QR code PNG
    pub fn render_qr(&self, token: &str) -> Result<Vec<u8>> {
        let code = QrCode::new(token.as_bytes())?;
        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(self.qr_size, self.qr_size)
            .build();

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventStatus, RegistrationStatus};
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn config(secret: &str) -> TicketConfig {
        TicketConfig {
            signing_secret: secret.to_string(),
            validity_grace_hours: 6,
            qr_size: 200,
        }
    }

    fn event() -> Event {
        let now = Utc::now();
        Event {
            id: 3,
            title: "Workshop".to_string(),
            description: None,
            venue: None,
            starts_at: now + Duration::hours(1),
            ends_at: now + Duration::hours(3),
            max_participants: Some(10),
            current_participants: 1,
            status: EventStatus::Published,
            certificates_issued: 0,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn registration() -> EventRegistration {
        EventRegistration {
            id: 11,
            event_id: 3,
            user_id: 21,
            status: RegistrationStatus::Registered,
            ticket_nonce: Uuid::new_v4(),
            registered_at: Utc::now(),
            cancelled_at: None,
            attended_at: None,
        }
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_issue_and_verify() {
        let service = TicketService::new(&config(SECRET));
        let registration = registration();
        let token = service.issue(&registration, &event()).unwrap();

        let claims = service.verify(&format!("  {}\n", token)).unwrap();
        assert_eq!(claims.evt, 3);
        assert_eq!(claims.reg, 11);
        assert_eq!(claims.user_id().unwrap(), 21);
        assert_eq!(claims.jti, registration.ticket_nonce);
    }

    #[test]
    fn test_cancelled_registration_gets_no_ticket() {
        let service = TicketService::new(&config(SECRET));
        let mut registration = registration();
        registration.status = RegistrationStatus::Cancelled;
        assert_matches!(service.issue(&registration, &event()), Err(EventDeskError::NotRegistered { .. }));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let issuer = TicketService::new(&config("another-secret-another-secret-xx"));
        let verifier = TicketService::new(&config(SECRET));
        let token = issuer.issue(&registration(), &event()).unwrap();
        assert_matches!(verifier.verify(&token), Err(EventDeskError::InvalidTicket(_)));
    }

    #[test]
    fn test_expired_ticket_is_rejected() {
        let service = TicketService::new(&config(SECRET));
        let mut claims = service.claims_for(&registration(), &event());
        claims.exp = (Utc::now() - Duration::hours(1)).timestamp();
        let token = service.sign(&claims).unwrap();
        assert_matches!(service.verify(&token), Err(EventDeskError::InvalidTicket(reason)) if reason == "expired");
    }

    #[test]
    fn test_garbage_payloads_are_rejected() {
        let service = TicketService::new(&config(SECRET));
        assert!(service.verify("").is_err());
        assert!(service.verify("not-a-ticket").is_err());
        assert!(service.verify("eyJhbGciOiJub25lIn0.eyJzdWIiOiIxIn0.").is_err());
    }

    #[test]
    fn test_render_qr_png() {
        let service = TicketService::new(&config(SECRET));
        let token = service.issue(&registration(), &event()).unwrap();
        let png = service.render_qr(&token).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert!(decoded.width() >= 200);
    }

    proptest! {
        #[test]
        fn tampered_payload_never_verifies(position in 0usize..400, replacement in "[A-Za-z0-9_-]") {
            let service = TicketService::new(&config(SECRET));
            let token = service.issue(&registration(), &event()).unwrap();
            let position = position % token.len();
            let original = token.as_bytes()[position] as char;
            let replacement = replacement.chars().next().unwrap();
            prop_assume!(original != replacement && original != '.');

            let mut tampered = token.clone();
            tampered.replace_range(position..=position, &replacement.to_string());
            prop_assert!(service.verify(&tampered).is_err());
        }
    }
}
