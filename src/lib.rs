//! EventDesk Telegram Bot
//!
//! Event registration with capacity limits, signed QR tickets, check-in at
//! the door, and the follow-up work (reminders, certificates, surveys) run
//! by a database-backed job queue.

pub mod config;
pub mod database;
pub mod handlers;
pub mod i18n;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{EventDeskError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::ServiceFactory;
pub use state::{ScenarioManager, StateStorage};
pub use i18n::I18n;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
