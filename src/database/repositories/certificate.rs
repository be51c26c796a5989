//! Certificate and survey repositories

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::certificate::{Certificate, CertificateSummary, SurveyResponse, SurveySummary};
use crate::utils::errors::EventDeskError;

const CERTIFICATE_COLUMNS: &str =
    "id, registration_id, event_id, user_id, sequence_number, certificate_number, verification_code, issued_at";

const SURVEY_COLUMNS: &str = "id, event_id, user_id, rating, comment, submitted_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct CertificateRepository {
    pool: PgPool,
}

impl CertificateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Issue the certificate of a registration, or return the one already issued
    ///
    /// The boolean is `true` when this call created the certificate.
    pub async fn issue(&self, registration_id: i64, event_id: i64, user_id: i64) -> Result<(Certificate, bool), EventDeskError> {
        if let Some(existing) = self.find_by_registration(registration_id).await? {
            return Ok((existing, false));
        }

        let mut tx = self.pool.begin().await?;

        let (sequence_number,): (i32,) = sqlx::query_as(
            r#"
            UPDATE events
            SET certificates_issued = certificates_issued + 1
            WHERE id = $1
            RETURNING certificates_issued
            "#
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EventDeskError::EventNotFound { event_id })?;

        let inserted = sqlx::query_as::<_, Certificate>(&format!(
            r#"
            INSERT INTO certificates (registration_id, event_id, user_id, sequence_number, certificate_number, verification_code, issued_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (registration_id) DO NOTHING
            RETURNING {CERTIFICATE_COLUMNS}
            "#
        ))
        .bind(registration_id)
        .bind(event_id)
        .bind(user_id)
        .bind(sequence_number)
        .bind(Certificate::format_number(event_id, sequence_number))
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        match inserted {
            Some(certificate) => {
                tx.commit().await?;
                Ok((certificate, true))
            }
            None => {
                // Lost the race to a concurrent issuer; give the number back
                tx.rollback().await?;
                let existing = self
                    .find_by_registration(registration_id)
                    .await?
                    .ok_or(EventDeskError::RegistrationNotFound { registration_id })?;
                Ok((existing, false))
            }
        }
    }

    pub async fn find_by_registration(&self, registration_id: i64) -> Result<Option<Certificate>, EventDeskError> {
        let certificate = sqlx::query_as::<_, Certificate>(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE registration_id = $1"
        ))
        .bind(registration_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(certificate)
    }

    pub async fn find_by_verification_code(&self, code: Uuid) -> Result<Option<Certificate>, EventDeskError> {
        let certificate = sqlx::query_as::<_, Certificate>(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE verification_code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(certificate)
    }

    /// Certificates of a user with event titles
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<CertificateSummary>, EventDeskError> {
        let certificates = sqlx::query_as::<_, CertificateSummary>(
            r#"
            SELECT c.certificate_number, c.verification_code, c.issued_at, e.id AS event_id, e.title AS event_title
            FROM certificates c
            JOIN events e ON e.id = c.event_id
            WHERE c.user_id = $1
            ORDER BY c.issued_at DESC
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(certificates)
    }
}

#[derive(Clone)]
#[derive(Debug)]
pub struct SurveyRepository {
    pool: PgPool,
}

impl SurveyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a rating; answering again replaces the previous rating
    pub async fn upsert_rating(&self, event_id: i64, user_id: i64, rating: i16) -> Result<SurveyResponse, EventDeskError> {
        let response = sqlx::query_as::<_, SurveyResponse>(&format!(
            r#"
            INSERT INTO survey_responses (event_id, user_id, rating, submitted_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id, user_id) DO UPDATE
            SET rating = EXCLUDED.rating, submitted_at = EXCLUDED.submitted_at
            RETURNING {SURVEY_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(user_id)
        .bind(rating)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(response)
    }

    /// Attach a free-text comment to an existing response
    pub async fn set_comment(&self, event_id: i64, user_id: i64, comment: &str) -> Result<Option<SurveyResponse>, EventDeskError> {
        let response = sqlx::query_as::<_, SurveyResponse>(&format!(
            r#"
            UPDATE survey_responses
            SET comment = $3, submitted_at = $4
            WHERE event_id = $1 AND user_id = $2
            RETURNING {SURVEY_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(user_id)
        .bind(comment)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(response)
    }

    pub async fn find(&self, event_id: i64, user_id: i64) -> Result<Option<SurveyResponse>, EventDeskError> {
        let response = sqlx::query_as::<_, SurveyResponse>(&format!(
            "SELECT {SURVEY_COLUMNS} FROM survey_responses WHERE event_id = $1 AND user_id = $2"
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(response)
    }

    pub async fn summary(&self, event_id: i64) -> Result<SurveySummary, EventDeskError> {
        let summary = sqlx::query_as::<_, SurveySummary>(
            r#"
            SELECT COUNT(*) AS responses, AVG(rating)::FLOAT8 AS average_rating
            FROM survey_responses
            WHERE event_id = $1
            "#
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }
}
