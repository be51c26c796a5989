//! Job queue repository
//!
//! Jobs are claimed with `FOR UPDATE SKIP LOCKED`, so several pollers can
//! share the table without handing the same job out twice. A job left in
//! `processing` longer than the visibility timeout is claimable again while
//! it has attempts left. Completion writes only land while the caller still
//! holds the claim.

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::job::{Job, JobCounts, JobStatus, NewJob};
use crate::utils::errors::EventDeskError;

const JOB_COLUMNS: &str =
    "id, kind, payload, dedup_key, status, attempts, max_attempts, run_at, locked_at, last_error, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a job; returns `None` when a job with the same dedup key exists
    pub async fn enqueue(&self, job: NewJob) -> Result<Option<Job>, EventDeskError> {
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            INSERT INTO jobs (kind, payload, dedup_key, max_attempts, run_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (dedup_key) WHERE dedup_key IS NOT NULL DO NOTHING
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.payload.kind())
        .bind(job.payload.to_value()?)
        .bind(job.payload.dedup_key())
        .bind(job.max_attempts)
        .bind(job.run_at)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Claim due jobs and mark them as processing
    ///
    /// Stale `processing` jobs are reclaimed only while they have attempts
    /// left; see [`Self::fail_abandoned`] for the rest.
    pub async fn claim_batch(&self, batch_size: i64, visibility_timeout_seconds: i64) -> Result<Vec<Job>, EventDeskError> {
        let now = Utc::now();
        let stale_before = now - chrono::Duration::seconds(visibility_timeout_seconds);

        let jobs = sqlx::query_as::<_, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'processing', attempts = attempts + 1, locked_at = $1, updated_at = $1
            WHERE id IN (
                SELECT id FROM jobs
                WHERE (status = 'pending' AND run_at <= $1)
                   OR (status = 'processing' AND locked_at < $2 AND attempts < max_attempts)
                ORDER BY run_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(stale_before)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Fail stale `processing` jobs that have used up their attempts
    pub async fn fail_abandoned(&self, visibility_timeout_seconds: i64) -> Result<Vec<Job>, EventDeskError> {
        let now = Utc::now();
        let stale_before = now - chrono::Duration::seconds(visibility_timeout_seconds);

        let jobs = sqlx::query_as::<_, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'failed',
                locked_at = NULL,
                last_error = 'Abandoned while processing after ' || attempts || ' attempts',
                updated_at = $1
            WHERE status = 'processing' AND locked_at < $2 AND attempts >= max_attempts
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(stale_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Mark a claimed job as done; `false` when the claim was lost to a reclaim
    pub async fn mark_completed(&self, job: &Job) -> Result<bool, EventDeskError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', locked_at = NULL, last_error = NULL, updated_at = $3
            WHERE id = $1 AND status = 'processing' AND locked_at = $2
            "#
        )
        .bind(job.id)
        .bind(job.locked_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Put a failed attempt back in the queue
    pub async fn schedule_retry(&self, job: &Job, run_at: DateTime<Utc>, error: &str) -> Result<bool, EventDeskError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', run_at = $3, locked_at = NULL, last_error = $4, updated_at = $5
            WHERE id = $1 AND status = 'processing' AND locked_at = $2
            "#
        )
        .bind(job.id)
        .bind(job.locked_at)
        .bind(run_at)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_failed(&self, job: &Job, error: &str) -> Result<bool, EventDeskError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', locked_at = NULL, last_error = $3, updated_at = $4
            WHERE id = $1 AND status = 'processing' AND locked_at = $2
            "#
        )
        .bind(job.id)
        .bind(job.locked_at)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Move a pending deduplicated job to a new time
    pub async fn reschedule_pending(&self, dedup_key: &str, run_at: DateTime<Utc>) -> Result<bool, EventDeskError> {
        let result = sqlx::query(
            "UPDATE jobs SET run_at = $2, updated_at = $3 WHERE dedup_key = $1 AND status = 'pending'"
        )
        .bind(dedup_key)
        .bind(run_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Move the pending certificate and survey jobs of an event's registrations
    pub async fn reschedule_follow_ups(&self, event_id: i64, run_at: DateTime<Utc>) -> Result<u64, EventDeskError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET run_at = $2, updated_at = $3
            WHERE status = 'pending'
              AND kind IN ('generate_certificate', 'send_survey')
              AND (payload->>'registration_id')::BIGINT IN (
                  SELECT id FROM event_registrations WHERE event_id = $1
              )
            "#
        )
        .bind(event_id)
        .bind(run_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Job>, EventDeskError> {
        let job = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    /// Most recently failed jobs
    pub async fn list_failed(&self, limit: i64) -> Result<Vec<Job>, EventDeskError> {
        let jobs = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'failed' ORDER BY updated_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Re-queue a failed job with a fresh attempt budget
    pub async fn retry_failed(&self, id: i64) -> Result<Option<Job>, EventDeskError> {
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'pending', attempts = 0, run_at = $2, last_error = NULL, updated_at = $2
            WHERE id = $1 AND status = 'failed'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    pub async fn counts_by_status(&self) -> Result<JobCounts, EventDeskError> {
        let rows: Vec<(JobStatus, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = JobCounts::default();
        for (status, count) in rows {
            match status {
                JobStatus::Pending => counts.pending = count,
                JobStatus::Processing => counts.processing = count,
                JobStatus::Completed => counts.completed = count,
                JobStatus::Failed => counts.failed = count,
            }
        }

        Ok(counts)
    }

    /// Delete completed jobs older than the retention window
    pub async fn purge_completed(&self, older_than_days: i64) -> Result<u64, EventDeskError> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE status = 'completed' AND updated_at < $1"
        )
        .bind(Utc::now() - chrono::Duration::days(older_than_days))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
