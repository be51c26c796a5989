//! Conversation scenarios
//!
//! Multi-step dialogs: onboarding, event creation, a check-in scanning
//! session and the optional survey comment. Each step declares the steps it
//! may move to and how its text input is validated.

use std::collections::HashMap;
use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::utils::errors::{EventDeskError, Result};
use super::context::ConversationContext;

/// Scenario ids
pub const ONBOARDING: &str = "onboarding";
pub const EVENT_CREATION: &str = "event_creation";
pub const CHECKIN: &str = "checkin";
pub const SURVEY_COMMENT: &str = "survey_comment";

/// Step ids shared by handlers and scenario definitions
pub mod steps {
    pub const LANGUAGE: &str = "language";
    pub const FULL_NAME: &str = "full_name";

    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const DATE: &str = "date";
    pub const START_TIME: &str = "start_time";
    pub const END_TIME: &str = "end_time";
    pub const VENUE: &str = "venue";
    pub const CAPACITY: &str = "capacity";
    pub const CONFIRMATION: &str = "confirmation";

    pub const SCANNING: &str = "scanning";
    pub const COMMENT: &str = "comment";
}

/// Typed by a user to leave a skippable step empty
pub const SKIP_INPUT: &str = "-";

#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: String,
    pub initial_step: String,
    pub steps: HashMap<String, ScenarioStep>,
    /// How long an idle context stays in Redis
    pub max_duration_seconds: i64,
    /// Whether another command may abandon this scenario
    pub interruptible: bool,
}

#[derive(Debug, Clone)]
pub struct ScenarioStep {
    pub id: String,
    pub next_steps: Vec<String>,
    pub validation: Option<StepValidation>,
    pub skippable: bool,
}

#[derive(Debug, Clone)]
pub struct StepValidation {
    pub input_type: InputType,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Compiled when the scenario is built
    pub pattern: Option<Regex>,
    /// Translation key shown when the input is rejected
    pub error_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InputType {
    Text,
    Number,
    Date,
    Time,
    Choice(Vec<String>),
}

/// Registry of every scenario the bot can run
#[derive(Debug, Clone)]
pub struct ScenarioManager {
    scenarios: HashMap<String, Scenario>,
}

impl ScenarioManager {
    pub fn new() -> Result<Self> {
        let mut manager = Self {
            scenarios: HashMap::new(),
        };
        manager.register_scenario(onboarding_scenario()?);
        manager.register_scenario(event_creation_scenario()?);
        manager.register_scenario(checkin_scenario());
        manager.register_scenario(survey_comment_scenario()?);
        Ok(manager)
    }

    pub fn register_scenario(&mut self, scenario: Scenario) {
        self.scenarios.insert(scenario.id.clone(), scenario);
    }

    pub fn get_scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    pub fn start_scenario(&self, context: &mut ConversationContext, scenario_id: &str) -> Result<()> {
        let scenario = self.require_scenario(scenario_id)?;
        context.start_scenario(
            scenario_id,
            &scenario.initial_step,
            Duration::seconds(scenario.max_duration_seconds),
        );
        Ok(())
    }

    /// Move to `next_step` if the current step allows it
    pub fn next_step(&self, context: &mut ConversationContext, next_step: &str) -> Result<()> {
        let current = self.get_current_step(context)?;
        if !current.next_steps.iter().any(|step| step == next_step) {
            return Err(EventDeskError::InvalidStateTransition {
                from: current.id.clone(),
                to: next_step.to_string(),
            });
        }

        context.next_step(next_step)
    }

    /// Check text input for the current step; returns the error translation key on rejection
    pub fn validate_input(&self, context: &ConversationContext, input: &str) -> std::result::Result<(), String> {
        let step = self
            .get_current_step(context)
            .map_err(|_| "errors.invalid_state".to_string())?;
        let input = input.trim();

        if step.skippable && input == SKIP_INPUT {
            return Ok(());
        }
        match &step.validation {
            Some(validation) => check_rules(input, validation).map_err(|_| validation.error_key.clone()),
            None => Ok(()),
        }
    }

    /// Whether the user typed the skip marker on a skippable step
    pub fn is_skip(&self, context: &ConversationContext, input: &str) -> bool {
        input.trim() == SKIP_INPUT
            && self.get_current_step(context).map_or(false, |step| step.skippable)
    }

    pub fn can_interrupt(&self, scenario_id: &str) -> bool {
        self.get_scenario(scenario_id).map_or(true, |s| s.interruptible)
    }

    pub fn get_current_step(&self, context: &ConversationContext) -> Result<&ScenarioStep> {
        let (scenario_id, step_id) = match context.current_state() {
            (Some(scenario), Some(step)) => (scenario, step),
            _ => return Err(EventDeskError::InvalidInput("No active scenario".to_string())),
        };

        self.require_scenario(scenario_id)?
            .steps
            .get(step_id)
            .ok_or_else(|| EventDeskError::InvalidInput(format!("Unknown step: {}", step_id)))
    }

    fn require_scenario(&self, id: &str) -> Result<&Scenario> {
        self.get_scenario(id)
            .ok_or_else(|| EventDeskError::InvalidInput(format!("Unknown scenario: {}", id)))
    }
}

fn check_rules(input: &str, validation: &StepValidation) -> Result<()> {
    let length = input.chars().count();
    if validation.min_length.map_or(false, |min| length < min) {
        return Err(EventDeskError::InvalidInput(format!("Input too short: {}", length)));
    }
    if validation.max_length.map_or(false, |max| length > max) {
        return Err(EventDeskError::InvalidInput(format!("Input too long: {}", length)));
    }

    if let Some(pattern) = &validation.pattern {
        if !pattern.is_match(input) {
            return Err(EventDeskError::InvalidInput("Input format is invalid".to_string()));
        }
    }

    let valid = match &validation.input_type {
        InputType::Text => true,
        InputType::Number => input.parse::<i64>().is_ok(),
        InputType::Date => chrono::NaiveDate::parse_from_str(input, "%Y-%m-%d").is_ok(),
        InputType::Time => chrono::NaiveTime::parse_from_str(input, "%H:%M").is_ok(),
        InputType::Choice(choices) => choices.iter().any(|choice| choice == input),
    };
    if !valid {
        return Err(EventDeskError::InvalidInput(format!("Unexpected input: {}", input)));
    }
    Ok(())
}

fn step(id: &str, next_steps: &[&str], validation: Option<StepValidation>, skippable: bool) -> (String, ScenarioStep) {
    (
        id.to_string(),
        ScenarioStep {
            id: id.to_string(),
            next_steps: next_steps.iter().map(|s| s.to_string()).collect(),
            validation,
            skippable,
        },
    )
}

fn rule(
    input_type: InputType,
    length: Option<(usize, usize)>,
    pattern: Option<&str>,
    error_key: &str,
) -> Result<Option<StepValidation>> {
    let pattern = pattern
        .map(|p| Regex::new(p).map_err(|e| EventDeskError::Config(format!("Invalid step pattern {}: {}", p, e))))
        .transpose()?;

    Ok(Some(StepValidation {
        input_type,
        min_length: length.map(|(min, _)| min),
        max_length: length.map(|(_, max)| max),
        pattern,
        error_key: error_key.to_string(),
    }))
}

fn onboarding_scenario() -> Result<Scenario> {
    let steps = HashMap::from([
        step(
            steps::LANGUAGE,
            &[steps::FULL_NAME],
            rule(
                InputType::Choice(vec!["en".to_string(), "ru".to_string()]),
                None,
                None,
                "onboarding.invalid_language",
            )?,
            false,
        ),
        step(
            steps::FULL_NAME,
            &[],
            rule(InputType::Text, Some((2, 100)), None, "onboarding.invalid_name")?,
            false,
        ),
    ]);

    Ok(Scenario {
        id: ONBOARDING.to_string(),
        initial_step: steps::LANGUAGE.to_string(),
        steps,
        max_duration_seconds: 3600,
        interruptible: false,
    })
}

fn event_creation_scenario() -> Result<Scenario> {
    let steps = HashMap::from([
        step(
            steps::TITLE,
            &[steps::DESCRIPTION],
            rule(InputType::Text, Some((3, 200)), None, "events.create.invalid_title")?,
            false,
        ),
        step(
            steps::DESCRIPTION,
            &[steps::DATE],
            rule(InputType::Text, Some((1, 2000)), None, "events.create.invalid_description")?,
            true,
        ),
        step(
            steps::DATE,
            &[steps::START_TIME],
            rule(InputType::Date, None, None, "events.create.invalid_date")?,
            false,
        ),
        step(
            steps::START_TIME,
            &[steps::END_TIME],
            rule(InputType::Time, None, None, "events.create.invalid_time")?,
            false,
        ),
        step(
            steps::END_TIME,
            &[steps::VENUE],
            rule(InputType::Time, None, None, "events.create.invalid_time")?,
            false,
        ),
        step(
            steps::VENUE,
            &[steps::CAPACITY],
            rule(InputType::Text, Some((2, 200)), None, "events.create.invalid_venue")?,
            true,
        ),
        step(
            steps::CAPACITY,
            &[steps::CONFIRMATION],
            rule(InputType::Number, None, Some(r"^[1-9][0-9]{0,5}$"), "events.create.invalid_capacity")?,
            true,
        ),
        step(
            steps::CONFIRMATION,
            &[],
            rule(
                InputType::Choice(vec!["confirm".to_string(), "cancel".to_string()]),
                None,
                None,
                "events.create.confirm_hint",
            )?,
            false,
        ),
    ]);

    Ok(Scenario {
        id: EVENT_CREATION.to_string(),
        initial_step: steps::TITLE.to_string(),
        steps,
        max_duration_seconds: 1800,
        interruptible: true,
    })
}

/// Organizer scanning tickets at the door until `/done`
fn checkin_scenario() -> Scenario {
    Scenario {
        id: CHECKIN.to_string(),
        initial_step: steps::SCANNING.to_string(),
        steps: HashMap::from([step(steps::SCANNING, &[], None, false)]),
        max_duration_seconds: 12 * 3600,
        interruptible: true,
    }
}

fn survey_comment_scenario() -> Result<Scenario> {
    Ok(Scenario {
        id: SURVEY_COMMENT.to_string(),
        initial_step: steps::COMMENT.to_string(),
        steps: HashMap::from([step(
            steps::COMMENT,
            &[],
            rule(InputType::Text, Some((1, 1000)), None, "surveys.invalid_comment")?,
            true,
        )]),
        max_duration_seconds: 3600,
        interruptible: true,
    })
}
