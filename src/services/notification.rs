//! Notification service implementation
//!
//! Sends translated messages, documents and ticket images to users through
//! teloxide. Bulk sends are paced to stay under Telegram's flood limits.

use std::time::Duration;
use teloxide::{
    Bot,
    payloads::{SendDocumentSetters, SendMessageSetters, SendPhotoSetters},
    prelude::Request,
    requests::Requester,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Message, ParseMode},
    utils::html,
};
use tracing::{debug, info, warn};
use crate::config::settings::Settings;
use crate::i18n::{I18n, TranslationParams, params};
use crate::models::{Event, User};
use crate::services::survey::{MAX_RATING, MIN_RATING};
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::helpers::format_timestamp;

const BULK_SEND_DELAY: Duration = Duration::from_millis(50);

/// Result of a paced bulk send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationService {
    bot: Bot,
    i18n: I18n,
    settings: Settings,
}

impl NotificationService {
    pub fn new(bot: Bot, i18n: I18n, settings: Settings) -> Self {
        Self { bot, i18n, settings }
    }

    pub fn i18n(&self) -> &I18n {
        &self.i18n
    }

    /// Translate `key` into the user's language and send it
    ///
    /// Parameter values are HTML-escaped; markup belongs in the translation.
    pub async fn notify(&self, user: &User, key: &str, params: Option<&TranslationParams>) -> Result<Message> {
        let escaped = params.map(|params| {
            params
                .iter()
                .map(|(k, v)| (k.clone(), html::escape(v)))
                .collect::<TranslationParams>()
        });
        let text = self.i18n.t(key, &user.language_code, escaped.as_ref());
        self.send_html(ChatId(user.telegram_id), text).await
    }

    pub async fn send_html(&self, chat_id: ChatId, text: String) -> Result<Message> {
        debug!(chat_id = ?chat_id, "Sending notification");
        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .send()
            .await
            .map_err(EventDeskError::Telegram)
    }

    /// Send each user the same key in their own language
    pub async fn notify_many(&self, users: &[User], key: &str, params: Option<&TranslationParams>) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for user in users {
            match self.notify(user, key, params).await {
                Ok(_) => outcome.sent += 1,
                Err(e) => {
                    outcome.failed += 1;
                    warn!(telegram_id = user.telegram_id, key = %key, error = %e, "Failed to send bulk notification");
                }
            }
            tokio::time::sleep(BULK_SEND_DELAY).await;
        }

        info!(key = %key, sent = outcome.sent, failed = outcome.failed, "Bulk notification completed");
        outcome
    }

    /// Ticket QR image with event details as caption
    pub async fn send_ticket(&self, user: &User, event: &Event, png: Vec<u8>) -> Result<Message> {
        let caption = self.i18n.t(
            "tickets.caption",
            &user.language_code,
            Some(&params([
                ("title", event.title.clone()),
                ("starts_at", format_timestamp(event.starts_at)),
                ("event_id", event.id.to_string()),
            ])),
        );
        let photo = InputFile::memory(png).file_name(format!("ticket-{}.png", event.id));

        self.bot
            .send_photo(ChatId(user.telegram_id), photo)
            .caption(caption)
            .send()
            .await
            .map_err(EventDeskError::Telegram)
    }

    pub async fn send_document(&self, user: &User, file_name: String, content: Vec<u8>, caption: String) -> Result<Message> {
        let document = InputFile::memory(content).file_name(file_name);
        self.bot
            .send_document(ChatId(user.telegram_id), document)
            .caption(caption)
            .send()
            .await
            .map_err(EventDeskError::Telegram)
    }

    /// Ask an attendee to rate an event
    pub async fn send_survey(&self, user: &User, event: &Event) -> Result<Message> {
        let text = self.i18n.t(
            "surveys.prompt",
            &user.language_code,
            Some(&params([("title", event.title.clone())])),
        );
        self.bot
            .send_message(ChatId(user.telegram_id), text)
            .reply_markup(survey_keyboard(event.id))
            .send()
            .await
            .map_err(EventDeskError::Telegram)
    }

    /// Plain message to every configured admin
    pub async fn notify_admins(&self, text: &str) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        if self.settings.bot.admin_ids.is_empty() {
            warn!("No admin IDs configured for admin notifications");
            return outcome;
        }

        for &admin_id in &self.settings.bot.admin_ids {
            match self.bot.send_message(ChatId(admin_id), text).send().await {
                Ok(_) => outcome.sent += 1,
                Err(e) => {
                    outcome.failed += 1;
                    warn!(admin_id = admin_id, error = %e, "Failed to send admin notification");
                }
            }
        }
        outcome
    }
}

/// One row of rating buttons, `survey:<event_id>:<rating>`
pub fn survey_keyboard(event_id: i64) -> InlineKeyboardMarkup {
    let row = (MIN_RATING..=MAX_RATING)
        .map(|rating| {
            InlineKeyboardButton::callback(
                "⭐".repeat(rating as usize),
                format!("survey:{}:{}", event_id, rating),
            )
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}
