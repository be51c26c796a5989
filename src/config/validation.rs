//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{EventDeskError, Result};
use super::Settings;

const MIN_SECRET_LEN: usize = 32;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_i18n_config(&settings.i18n)?;
    validate_logging_config(&settings.logging)?;
    validate_ticket_config(&settings.tickets)?;
    validate_jobs_config(&settings.jobs)?;
    validate_certificate_config(&settings.certificates)?;
    validate_rate_limit_config(&settings.rate_limit)?;

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(EventDeskError::Config(
            "Bot token is required".to_string()
        ));
    }

    if config.admin_ids.is_empty() {
        return Err(EventDeskError::Config(
            "At least one admin ID must be configured".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(EventDeskError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(EventDeskError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(EventDeskError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(EventDeskError::Config(
            "Redis URL is required".to_string()
        ));
    }

    Ok(())
}

/// Validate internationalization configuration
fn validate_i18n_config(config: &super::I18nConfig) -> Result<()> {
    if config.default_language.is_empty() {
        return Err(EventDeskError::Config(
            "Default language is required".to_string()
        ));
    }

    if config.supported_languages.is_empty() {
        return Err(EventDeskError::Config(
            "At least one supported language is required".to_string()
        ));
    }

    if !config.supported_languages.contains(&config.default_language) {
        return Err(EventDeskError::Config(
            "Default language must be in supported languages list".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(EventDeskError::Config(
            "Log level is required".to_string()
        ));
    }

    // Directives like "eventdesk=debug,sqlx=warn" are passed to EnvFilter as-is
    if !config.level.contains('=') {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.level.as_str()) {
            return Err(EventDeskError::Config(
                format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
            ));
        }
    }

    Ok(())
}

/// Validate ticket signing configuration
fn validate_ticket_config(config: &super::TicketConfig) -> Result<()> {
    if config.signing_secret.len() < MIN_SECRET_LEN {
        return Err(EventDeskError::Config(
            format!("Ticket signing secret must be at least {} bytes", MIN_SECRET_LEN)
        ));
    }

    if config.validity_grace_hours < 0 {
        return Err(EventDeskError::Config(
            "Ticket validity grace cannot be negative".to_string()
        ));
    }

    if !(100..=2000).contains(&config.qr_size) {
        return Err(EventDeskError::Config(
            "QR size must be between 100 and 2000 pixels".to_string()
        ));
    }

    Ok(())
}

/// Validate background job configuration
fn validate_jobs_config(config: &super::JobsConfig) -> Result<()> {
    if config.poll_interval_seconds == 0 {
        return Err(EventDeskError::Config(
            "Job poll interval must be greater than 0".to_string()
        ));
    }

    if config.batch_size <= 0 {
        return Err(EventDeskError::Config(
            "Job batch size must be greater than 0".to_string()
        ));
    }

    if config.max_attempts <= 0 {
        return Err(EventDeskError::Config(
            "Job max attempts must be greater than 0".to_string()
        ));
    }

    if config.retry_base_seconds == 0 || config.retry_base_seconds > config.retry_max_seconds {
        return Err(EventDeskError::Config(
            "Job retry base must be positive and not exceed the retry cap".to_string()
        ));
    }

    if config.visibility_timeout_seconds <= config.poll_interval_seconds as i64 {
        return Err(EventDeskError::Config(
            "Job visibility timeout must be longer than the poll interval".to_string()
        ));
    }

    Ok(())
}

/// Validate certificate configuration
fn validate_certificate_config(config: &super::CertificateConfig) -> Result<()> {
    if config.issuer_name.trim().is_empty() {
        return Err(EventDeskError::Config(
            "Certificate issuer name is required".to_string()
        ));
    }

    if let Some(base) = &config.verify_base_url {
        url::Url::parse(base)?;
    }

    Ok(())
}

/// Validate rate limit configuration
fn validate_rate_limit_config(config: &super::RateLimitConfig) -> Result<()> {
    if config.requests_per_minute == 0 {
        return Err(EventDeskError::Config(
            "Rate limit must allow at least one request per minute".to_string()
        ));
    }

    Ok(())
}
