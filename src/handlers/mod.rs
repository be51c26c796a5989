//! Bot handlers module
//!
//! This module contains all Telegram bot handlers organized by type:
//! - Command handlers for bot commands
//! - Callback handlers for inline keyboard interactions
//! - Message handlers for conversation input

pub mod commands;
pub mod callbacks;
pub mod messages;

pub use commands::{Command, handle_command};
pub use callbacks::handle_callback_query;
pub use messages::handle_message;

use teloxide::{Bot, types::ChatId, prelude::*};
use tracing::{debug, error, warn};
use crate::i18n::I18n;
use crate::models::User;
use crate::services::ServiceFactory;
use crate::utils::errors::{ErrorSeverity, EventDeskError, Result};

/// Load or create the stored user behind a Telegram account
pub async fn current_user(services: &ServiceFactory, from: &teloxide::types::User) -> Result<User> {
    services
        .user_service
        .register_or_update(
            from.id.0 as i64,
            from.username.clone(),
            Some(from.first_name.clone()),
            from.last_name.clone(),
            from.language_code.clone(),
        )
        .await
}

/// Turn a failed action into a translated reply
///
/// Domain errors are answered and swallowed; anything that maps to the
/// generic message is still returned so the dispatcher logs it.
pub async fn report(bot: &Bot, chat_id: ChatId, i18n: &I18n, language: &str, result: Result<()>) -> Result<()> {
    let Err(e) = result else {
        return Ok(());
    };

    match e.severity() {
        ErrorSeverity::Info => debug!(chat_id = ?chat_id, error = %e, "Action rejected"),
        ErrorSeverity::Warning => warn!(chat_id = ?chat_id, error = %e, "Action refused"),
        _ => error!(chat_id = ?chat_id, error = %e, "Action failed"),
    }

    bot.send_message(chat_id, i18n.error_message(&e, language)).await?;
    if e.user_message_key() == "errors.generic" {
        Err(e)
    } else {
        Ok(())
    }
}

/// Parse a required numeric command argument
pub fn id_argument(arg: &str) -> Result<i64> {
    if arg.trim().is_empty() {
        return Err(EventDeskError::InvalidInput("Missing id argument".to_string()));
    }
    crate::utils::helpers::parse_id_argument(arg)
}
