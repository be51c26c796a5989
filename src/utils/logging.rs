//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the EventDesk application.

use tracing::{info, warn, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use crate::config::LoggingConfig;
use crate::utils::errors::{EventDeskError, Result};

/// Initialize logging based on configuration
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| EventDeskError::Config(format!("Invalid log filter '{}': {}", config.level, e)))?;

    let stdout_layer = if config.json {
        fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        fmt::layer().with_writer(std::io::stdout).boxed()
    };

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_ansi(false).with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(filter)
        .try_init()
        .map_err(|e| EventDeskError::Config(format!("Failed to install tracing subscriber: {}", e)))?;

    info!(level = %config.level, file = ?config.directory, "Logging initialized");
    Ok(guard)
}

/// Log user actions with structured data
pub fn log_user_action(user_id: i64, action: &str, details: Option<&str>) {
    info!(
        user_id = user_id,
        action = action,
        details = details,
        "User action performed"
    );
}

/// Log event management actions
pub fn log_event_action(event_id: i64, action: &str, user_id: i64, details: Option<&str>) {
    info!(
        event_id = event_id,
        action = action,
        user_id = user_id,
        details = details,
        "Event action performed"
    );
}

/// Log admin actions
pub fn log_admin_action(admin_id: i64, action: &str, target: Option<&str>, details: Option<&str>) {
    warn!(
        admin_id = admin_id,
        action = action,
        target = target,
        details = details,
        "Admin action performed"
    );
}

/// Log check-in scans
pub fn log_checkin(event_id: i64, registration_id: i64, scanned_by: i64, first_scan: bool) {
    if first_scan {
        info!(
            event_id = event_id,
            registration_id = registration_id,
            scanned_by = scanned_by,
            "Participant checked in"
        );
    } else {
        debug!(
            event_id = event_id,
            registration_id = registration_id,
            scanned_by = scanned_by,
            "Repeated scan of an already checked-in ticket"
        );
    }
}

/// Log the outcome of a background job attempt
pub fn log_job_outcome(job_id: i64, kind: &str, attempt: i32, outcome: &str, error: Option<&str>) {
    match error {
        Some(error) => warn!(
            job_id = job_id,
            kind = kind,
            attempt = attempt,
            outcome = outcome,
            error = error,
            "Job attempt failed"
        ),
        None => info!(
            job_id = job_id,
            kind = kind,
            attempt = attempt,
            outcome = outcome,
            "Job completed"
        ),
    }
}
