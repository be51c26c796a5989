//! Background job poller
//!
//! A single task ticks every `poll_interval_seconds`, claims due jobs and
//! runs them. Ticks missed while a pass is running are skipped, so passes
//! never overlap. Several bot instances can poll the same table: claims use
//! `FOR UPDATE SKIP LOCKED`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::{sync::mpsc, time::{interval, Instant}};
use tracing::{debug, error, info, warn};
use crate::config::JobsConfig;
use crate::database::repositories::JobRepository;
use crate::jobs::backoff::RetryPolicy;
use crate::jobs::processors::JobHandler;
use crate::models::Job;
use crate::utils::errors::Result;
use crate::utils::logging::log_job_outcome;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Counters for one poll pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    /// Jobs whose claim was taken over by another worker before the result was written
    pub lost: usize,
    /// Jobs whose result could not be written
    pub errors: usize,
}

/// What happened to a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Retried,
    Failed,
    Lost,
}

pub struct JobPoller<H> {
    repository: JobRepository,
    handler: Arc<H>,
    config: JobsConfig,
    policy: RetryPolicy,
}

impl<H: JobHandler> JobPoller<H> {
    pub fn new(repository: JobRepository, handler: Arc<H>, config: JobsConfig) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self { repository, handler, config, policy }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Poll until a shutdown message arrives or the sender is dropped
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job poller is disabled");
            return;
        }

        let period = Duration::from_secs(self.config.poll_interval_seconds.max(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_purge: Option<Instant> = None;

        info!(
            interval_secs = period.as_secs(),
            batch_size = self.config.batch_size,
            "Job poller started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(stats) if stats.claimed > 0 || stats.failed > 0 => info!(
                            claimed = stats.claimed,
                            completed = stats.completed,
                            retried = stats.retried,
                            failed = stats.failed,
                            lost = stats.lost,
                            errors = stats.errors,
                            "Job poll pass finished"
                        ),
                        Ok(_) => debug!("No due jobs"),
                        Err(e) => warn!(error = %e, "Job poll pass failed"),
                    }

                    if last_purge.map_or(true, |at| at.elapsed() >= PURGE_INTERVAL) {
                        self.purge().await;
                        last_purge = Some(Instant::now());
                    }
                }
                _ = shutdown.recv() => {
                    info!("Job poller shutting down");
                    break;
                }
            }
        }
    }

    /// Claim one batch of due jobs and process them in order
    pub async fn run_once(&self) -> Result<PollStats> {
        let mut stats = PollStats::default();

        for job in self
            .repository
            .fail_abandoned(self.config.visibility_timeout_seconds)
            .await?
        {
            let message = job.last_error.clone().unwrap_or_default();
            log_job_outcome(job.id, &job.kind, job.attempts, "failed", Some(&message));
            self.handler.on_failed(&job, &message).await;
            stats.failed += 1;
        }

        let jobs = self
            .repository
            .claim_batch(self.config.batch_size, self.config.visibility_timeout_seconds)
            .await?;
        stats.claimed = jobs.len();

        for job in &jobs {
            match self.process(job).await {
                Ok(JobOutcome::Completed) => stats.completed += 1,
                Ok(JobOutcome::Retried) => stats.retried += 1,
                Ok(JobOutcome::Failed) => stats.failed += 1,
                Ok(JobOutcome::Lost) => {
                    warn!(job_id = job.id, kind = %job.kind, "Job claim was taken over, result dropped");
                    stats.lost += 1;
                }
                Err(e) => {
                    error!(job_id = job.id, kind = %job.kind, error = %e, "Failed to record job result");
                    stats.errors += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Run one claimed job and record its result
    async fn process(&self, job: &Job) -> Result<JobOutcome> {
        let result = match job.payload() {
            Ok(payload) => self.handler.handle(job, payload).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                if !self.repository.mark_completed(job).await? {
                    return Ok(JobOutcome::Lost);
                }
                log_job_outcome(job.id, &job.kind, job.attempts, "completed", None);
                Ok(JobOutcome::Completed)
            }
            Err(e) if e.is_recoverable() && !job.attempts_exhausted() => {
                let delay = self.policy.delay_for(job.attempts);
                let run_at = Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64);
                let message = e.to_string();
                if !self.repository.schedule_retry(job, run_at, &message).await? {
                    return Ok(JobOutcome::Lost);
                }
                log_job_outcome(job.id, &job.kind, job.attempts, "retry", Some(&message));
                Ok(JobOutcome::Retried)
            }
            Err(e) => {
                let message = e.to_string();
                if !self.repository.mark_failed(job, &message).await? {
                    return Ok(JobOutcome::Lost);
                }
                log_job_outcome(job.id, &job.kind, job.attempts, "failed", Some(&message));
                self.handler.on_failed(job, &message).await;
                Ok(JobOutcome::Failed)
            }
        }
    }

    async fn purge(&self) {
        match self.repository.purge_completed(self.config.completed_retention_days).await {
            Ok(0) => {}
            Ok(purged) => info!(purged = purged, "Purged completed jobs"),
            Err(e) => warn!(error = %e, "Failed to purge completed jobs"),
        }
    }
}
