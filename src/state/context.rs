//! Conversation context
//!
//! One context per Telegram user: the active scenario, its current step and
//! the answers collected so far.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use chrono::{DateTime, Utc, Duration};
use crate::utils::errors::{EventDeskError, Result};

const MAX_DATA_ENTRIES: usize = 32;
const MAX_SERIALIZED_BYTES: usize = 16 * 1024;

/// User conversation context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Telegram user id this context belongs to
    pub user_id: i64,
    pub scenario: Option<String>,
    pub step: Option<String>,
    /// Answers collected by the scenario
    pub data: HashMap<String, serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            scenario: None,
            step: None,
            data: HashMap::new(),
            expires_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Enter a scenario at its first step, dropping earlier answers
    pub fn start_scenario(&mut self, scenario: &str, initial_step: &str, lifetime: Duration) {
        let now = Utc::now();
        self.scenario = Some(scenario.to_string());
        self.step = Some(initial_step.to_string());
        self.data.clear();
        self.updated_at = now;
        self.expires_at = Some(now + lifetime);
    }

    pub fn next_step(&mut self, step: &str) -> Result<()> {
        if self.scenario.is_none() {
            return Err(EventDeskError::InvalidStateTransition {
                from: "no_scenario".to_string(),
                to: step.to_string(),
            });
        }

        self.step = Some(step.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete_scenario(&mut self) {
        self.scenario = None;
        self.step = None;
        self.data.clear();
        self.expires_at = None;
        self.updated_at = Utc::now();
    }

    pub fn set_data<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        self.data.insert(key.to_string(), serde_json::to_value(value)?);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn get_data<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_data::<String>(key).unwrap_or(None)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_data::<i64>(key).unwrap_or(None)
    }

    /// Value that must have been stored by an earlier step
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get_data(key)?
            .ok_or_else(|| EventDeskError::InvalidInput(format!("Missing conversation data: {}", key)))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |expires_at| Utc::now() > expires_at)
    }

    pub fn set_expiry(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = Some(expires_at);
        self.updated_at = Utc::now();
    }

    pub fn is_in_scenario(&self, scenario: &str) -> bool {
        self.scenario.as_deref() == Some(scenario)
    }

    pub fn is_at(&self, scenario: &str, step: &str) -> bool {
        self.is_in_scenario(scenario) && self.step.as_deref() == Some(step)
    }

    pub fn current_state(&self) -> (Option<&str>, Option<&str>) {
        (self.scenario.as_deref(), self.step.as_deref())
    }

    /// Reject contexts too large to keep in Redis
    pub fn ensure_within_limits(&self) -> Result<()> {
        if self.data.len() > MAX_DATA_ENTRIES {
            return Err(EventDeskError::InvalidInput(format!(
                "Too many conversation entries: {} > {}",
                self.data.len(),
                MAX_DATA_ENTRIES
            )));
        }

        let size = serde_json::to_vec(self)?.len();
        if size > MAX_SERIALIZED_BYTES {
            return Err(EventDeskError::InvalidInput(format!(
                "Conversation context too large: {} > {}",
                size, MAX_SERIALIZED_BYTES
            )));
        }
        Ok(())
    }
}
