//! Certificate and survey models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Certificate {
    pub id: i64,
    pub registration_id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub sequence_number: i32,
    pub certificate_number: String,
    pub verification_code: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl Certificate {
    /// Human readable number, e.g. `CERT-00042-0007`
    pub fn format_number(event_id: i64, sequence_number: i32) -> String {
        format!("CERT-{:05}-{:04}", event_id, sequence_number)
    }
}

/// Certificate joined with its event title, for "my certificates"
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CertificateSummary {
    pub certificate_number: String,
    pub verification_code: Uuid,
    pub issued_at: DateTime<Utc>,
    pub event_id: i64,
    pub event_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SurveyResponse {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub rating: i16,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct SurveySummary {
    pub responses: i64,
    pub average_rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_number_format() {
        assert_eq!(Certificate::format_number(42, 7), "CERT-00042-0007");
        assert_eq!(Certificate::format_number(123456, 12345), "CERT-123456-12345");
    }
}
