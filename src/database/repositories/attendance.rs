//! Attendance repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::registration::{AttendanceLog, CheckInOutcome};
use crate::utils::errors::EventDeskError;

const ATTENDANCE_COLUMNS: &str = "id, registration_id, event_id, user_id, scanned_by, checked_in_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a check-in exactly once per registration
    ///
    /// A repeated scan writes nothing and returns the original log row.
    pub async fn check_in(
        &self,
        registration_id: i64,
        event_id: i64,
        user_id: i64,
        scanned_by: i64,
    ) -> Result<CheckInOutcome, EventDeskError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, AttendanceLog>(&format!(
            r#"
            INSERT INTO attendance_logs (registration_id, event_id, user_id, scanned_by, checked_in_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (registration_id) DO NOTHING
            RETURNING {ATTENDANCE_COLUMNS}
            "#
        ))
        .bind(registration_id)
        .bind(event_id)
        .bind(user_id)
        .bind(scanned_by)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(log) = inserted else {
            let existing = sqlx::query_as::<_, AttendanceLog>(&format!(
                "SELECT {ATTENDANCE_COLUMNS} FROM attendance_logs WHERE registration_id = $1"
            ))
            .bind(registration_id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            return Ok(CheckInOutcome::AlreadyCheckedIn(existing));
        };

        let updated = sqlx::query(
            r#"
            UPDATE event_registrations
            SET status = 'attended', attended_at = $2
            WHERE id = $1 AND status = 'registered'
            "#
        )
        .bind(registration_id)
        .bind(log.checked_in_at)
        .execute(&mut *tx)
        .await?;

        // Cancelled between verification and this write
        if updated.rows_affected() != 1 {
            return Err(EventDeskError::NotRegistered { event_id, user_id });
        }

        tx.commit().await?;
        Ok(CheckInOutcome::CheckedIn(log))
    }

    /// Attendance row of a registration
    pub async fn find_by_registration(&self, registration_id: i64) -> Result<Option<AttendanceLog>, EventDeskError> {
        let log = sqlx::query_as::<_, AttendanceLog>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance_logs WHERE registration_id = $1"
        ))
        .bind(registration_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }
}
