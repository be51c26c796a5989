//! Test helpers module
//!
//! Shared setup for the integration tests: a migrated PostgreSQL database,
//! a mock Telegram Bot API and ready-made settings and fixtures.
#![allow(dead_code)]

pub mod database_helper;
pub mod telegram_mock;
pub mod test_data;

pub use database_helper::*;
pub use telegram_mock::*;
pub use test_data::*;
