//! Background job model

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::utils::errors::{EventDeskError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: i64,
    pub kind: String,
    pub payload: serde_json::Value,
    pub dedup_key: Option<String>,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn payload(&self) -> Result<JobPayload> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            EventDeskError::InvalidInput(format!("Job {} has an unreadable {} payload: {}", self.id, self.kind, e))
        })
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Typed job payload; the tag is stored in the `kind` column as well
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    SendNotification {
        user_id: i64,
        message_key: String,
        #[serde(default)]
        params: HashMap<String, String>,
    },
    GenerateCertificate {
        registration_id: i64,
    },
    SendSurvey {
        registration_id: i64,
    },
    EventReminder {
        event_id: i64,
    },
}

impl JobPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            JobPayload::SendNotification { .. } => "send_notification",
            JobPayload::GenerateCertificate { .. } => "generate_certificate",
            JobPayload::SendSurvey { .. } => "send_survey",
            JobPayload::EventReminder { .. } => "event_reminder",
        }
    }

    /// Key that keeps at most one copy of the job in the queue
    pub fn dedup_key(&self) -> Option<String> {
        match self {
            JobPayload::SendNotification { .. } => None,
            JobPayload::GenerateCertificate { registration_id } => {
                Some(format!("certificate:{}", registration_id))
            }
            JobPayload::SendSurvey { registration_id } => Some(format!("survey:{}", registration_id)),
            JobPayload::EventReminder { event_id } => Some(format!("reminder:{}", event_id)),
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub payload: JobPayload,
    pub run_at: DateTime<Utc>,
    pub max_attempts: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}
