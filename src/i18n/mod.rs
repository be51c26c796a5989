//! Internationalization module
//!
//! Translation loading, lookup with fallback, parameter substitution and
//! pluralization for the bot's supported languages.

pub mod loader;

pub use loader::{I18n, TranslationParams, params};
