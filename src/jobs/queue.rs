//! Producer side of the job table

use chrono::{DateTime, Utc};
use tracing::debug;
use crate::config::JobsConfig;
use crate::database::repositories::JobRepository;
use crate::models::job::{Job, JobPayload, NewJob};
use crate::utils::errors::Result;

/// Enqueues background work with the configured attempt budget
#[derive(Clone, Debug)]
pub struct JobQueue {
    repository: JobRepository,
    max_attempts: i32,
}

impl JobQueue {
    pub fn new(repository: JobRepository, config: &JobsConfig) -> Self {
        Self {
            repository,
            max_attempts: config.max_attempts,
        }
    }

    /// Enqueue a job to run at `run_at`; deduplicated jobs return `None`
    pub async fn enqueue_at(&self, payload: JobPayload, run_at: DateTime<Utc>) -> Result<Option<Job>> {
        let kind = payload.kind();
        let job = self
            .repository
            .enqueue(NewJob {
                payload,
                run_at,
                max_attempts: self.max_attempts,
            })
            .await?;

        match &job {
            Some(job) => debug!(job_id = job.id, kind = kind, run_at = %run_at, "Job enqueued"),
            None => debug!(kind = kind, "Job already queued, skipping duplicate"),
        }
        Ok(job)
    }

    pub async fn enqueue_now(&self, payload: JobPayload) -> Result<Option<Job>> {
        self.enqueue_at(payload, Utc::now()).await
    }

    pub fn repository(&self) -> &JobRepository {
        &self.repository
    }
}
