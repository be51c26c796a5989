//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub i18n: I18nConfig,
    pub logging: LoggingConfig,
    pub features: FeaturesConfig,
    pub tickets: TicketConfig,
    pub jobs: JobsConfig,
    pub certificates: CertificateConfig,
    pub rate_limit: RateLimitConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub token: String,
    /// Telegram ids that always act with the admin role
    pub admin_ids: Vec<i64>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Internationalization configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct I18nConfig {
    pub default_language: String,
    pub supported_languages: Vec<String>,
    pub translations_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for the daily rolling log file; stdout only when unset
    pub directory: Option<String>,
    pub file_prefix: String,
    /// Emit JSON lines instead of the human readable format
    pub json: bool,
    /// Log a redacted summary of every incoming update
    pub log_updates: bool,
}

/// Feature flags configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    pub admin_panel: bool,
    pub surveys: bool,
    pub certificates: bool,
    pub event_reminders: bool,
}

/// Check-in ticket configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TicketConfig {
    /// HMAC secret used to sign ticket tokens
    pub signing_secret: String,
    /// How long after the event end a ticket still verifies
    pub validity_grace_hours: i64,
    /// Minimum side of the rendered QR image in pixels
    pub qr_size: u32,
}

/// Background job poller configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    pub enabled: bool,
    pub poll_interval_seconds: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
    pub retry_base_seconds: u64,
    pub retry_max_seconds: u64,
    /// Jobs stuck in processing longer than this are handed out again
    pub visibility_timeout_seconds: i64,
    pub reminder_hours_before: i64,
    pub completed_retention_days: i64,
}

/// Certificate rendering configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CertificateConfig {
    pub issuer_name: String,
    /// Public page where a verification code can be checked
    pub verify_base_url: Option<String>,
}

/// Per-user rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst: u32,
    pub admin_exempt: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&Settings::default())?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("EVENTDESK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("bot.admin_ids")
                    .with_list_parse_key("i18n.supported_languages")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::EventDeskError> {
        super::validation::validate_settings(self)
    }

    /// Render these settings as a TOML document
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                token: String::new(),
                admin_ids: vec![],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/eventdesk".to_string(),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_seconds: 30,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "eventdesk:".to_string(),
                ttl_seconds: 3600,
            },
            i18n: I18nConfig {
                default_language: "en".to_string(),
                supported_languages: vec!["en".to_string(), "ru".to_string()],
                translations_dir: "translations".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: None,
                file_prefix: "eventdesk.log".to_string(),
                json: false,
                log_updates: true,
            },
            features: FeaturesConfig {
                admin_panel: true,
                surveys: true,
                certificates: true,
                event_reminders: true,
            },
            tickets: TicketConfig {
                signing_secret: String::new(),
                validity_grace_hours: 6,
                qr_size: 400,
            },
            jobs: JobsConfig {
                enabled: true,
                poll_interval_seconds: 10,
                batch_size: 20,
                max_attempts: 5,
                retry_base_seconds: 30,
                retry_max_seconds: 3600,
                visibility_timeout_seconds: 300,
                reminder_hours_before: 24,
                completed_retention_days: 14,
            },
            certificates: CertificateConfig {
                issuer_name: "EventDesk".to_string(),
                verify_base_url: None,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: 30,
                burst: 10,
                admin_exempt: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_round_trip_through_toml() {
        let rendered = Settings::default().to_toml().unwrap();
        assert!(rendered.contains("[jobs]"));
        assert!(rendered.contains("poll_interval_seconds = 10"));

        let parsed: Settings = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.jobs.batch_size, 20);
        assert_eq!(parsed.i18n.supported_languages, vec!["en", "ru"]);
    }
}
