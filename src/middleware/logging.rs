//! Logging middleware
//!
//! Logs one line per incoming update. Message text is never logged: it can
//! carry ticket tokens or personal data, so only the command name (if any)
//! and the text length are recorded.

use teloxide::types::{MediaKind, Message, MessageKind, Update, UpdateKind};
use tracing::{debug, info};

/// What we record about a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub kind: &'static str,
    pub command: Option<String>,
    pub text_len: usize,
}

/// Logging middleware for bot interactions
#[derive(Clone)]
pub struct LoggingMiddleware {
    log_user_interactions: bool,
}

impl LoggingMiddleware {
    pub fn new(log_user_interactions: bool) -> Self {
        Self { log_user_interactions }
    }

    /// Log incoming update
    pub fn log_update(&self, update: &Update) {
        if !self.log_user_interactions {
            return;
        }

        match &update.kind {
            UpdateKind::Message(message) => self.log_message(message),
            UpdateKind::CallbackQuery(callback) => {
                info!(
                    user_id = callback.from.id.0,
                    action = callback.data.as_deref().and_then(|d| d.split(':').next()).unwrap_or("none"),
                    "Callback query received"
                );
            }
            _ => debug!(update_id = update.id.0, "Other update type received"),
        }
    }

    fn log_message(&self, message: &Message) {
        let summary = summarize_message(message);
        info!(
            user_id = message.from.as_ref().map(|u| u.id.0),
            chat_id = message.chat.id.0,
            private = message.chat.is_private(),
            message_type = summary.kind,
            command = summary.command.as_deref(),
            text_len = summary.text_len,
            "Message received"
        );
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new(true)
    }
}

pub fn summarize_message(message: &Message) -> MessageSummary {
    let kind = match &message.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(_) => "text",
            MediaKind::Photo(_) => "photo",
            MediaKind::Document(_) => "document",
            MediaKind::Sticker(_) => "sticker",
            _ => "other_media",
        },
        _ => "service",
    };
    let text = message.text().or(message.caption()).unwrap_or_default();

    MessageSummary {
        kind,
        command: command_name(text),
        text_len: text.chars().count(),
    }
}

/// `/register@eventdesk_bot 12` -> `register`
pub fn command_name(text: &str) -> Option<String> {
    let word = text.trim_start().strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    (!name.is_empty()).then(|| name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("/register 12"), Some("register".to_string()));
        assert_eq!(command_name("/Start@eventdesk_bot"), Some("start".to_string()));
        assert_eq!(command_name("eyJhbGciOiJIUzI1NiJ9.payload.sig"), None);
        assert_eq!(command_name("/"), None);
        assert_eq!(command_name(""), None);
    }

    #[test]
    fn test_default_logging_middleware() {
        let middleware = LoggingMiddleware::default();
        assert!(middleware.log_user_interactions);
    }
}
