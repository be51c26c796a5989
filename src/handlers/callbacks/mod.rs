//! Callback query handlers module
//!
//! This module contains handlers for all inline keyboard button callbacks.
//! Callback data has the form `action:arg[:arg]`.

use teloxide::{Bot, types::{CallbackQuery, ChatId}, prelude::*};
use tracing::{debug, info, warn};
use crate::handlers::commands::{admin, events, start};
use crate::handlers::{current_user, report};
use crate::i18n::I18n;
use crate::models::User;
use crate::services::ServiceFactory;
use crate::state::{ScenarioManager, StateStorage};
use crate::state::scenarios::SURVEY_COMMENT;
use crate::utils::errors::Result;

/// Decoded inline button payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Language(String),
    Register(i64),
    Unregister(i64),
    Ticket(i64),
    Survey { event_id: i64, rating: i16 },
    ConfirmEvent(bool),
    Publish(i64),
    RetryJob(i64),
    AdminStats,
    AdminJobs,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let parts: Vec<&str> = data.split(':').collect();
        let id = |index: usize| parts.get(index).and_then(|p| p.parse::<i64>().ok());

        match parts.first().copied()? {
            "lang" => parts.get(1).map(|code| CallbackAction::Language(code.to_string())),
            "register" => id(1).map(CallbackAction::Register),
            "unregister" => id(1).map(CallbackAction::Unregister),
            "ticket" => id(1).map(CallbackAction::Ticket),
            "survey" => {
                let rating = parts.get(2).and_then(|p| p.parse::<i16>().ok())?;
                id(1).map(|event_id| CallbackAction::Survey { event_id, rating })
            }
            "newevent" => match parts.get(1).copied()? {
                "confirm" => Some(CallbackAction::ConfirmEvent(true)),
                "cancel" => Some(CallbackAction::ConfirmEvent(false)),
                _ => None,
            },
            "publish" => id(1).map(CallbackAction::Publish),
            "job_retry" => id(1).map(CallbackAction::RetryJob),
            "admin" => match parts.get(1).copied()? {
                "stats" => Some(CallbackAction::AdminStats),
                "jobs" => Some(CallbackAction::AdminJobs),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Main callback query dispatcher
pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    services: ServiceFactory,
    scenario_manager: ScenarioManager,
    state_storage: StateStorage,
    i18n: I18n,
) -> Result<()> {
    let telegram_id = query.from.id.0 as i64;
    let chat_id = query
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(telegram_id));

    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, callback_id = %query.id, "Failed to answer callback query");
    }

    let Some(data) = query.data.as_deref() else {
        return Ok(());
    };
    let Some(action) = CallbackAction::parse(data) else {
        warn!(telegram_id = telegram_id, callback_data = %data, "Unknown callback data");
        return Ok(());
    };
    debug!(telegram_id = telegram_id, action = ?action, "Routing callback");

    let user = current_user(&services, &query.from).await?;
    let lang = user.language_code.clone();

    let result = match action {
        CallbackAction::Language(code) => {
            return start::handle_language_choice(
                bot,
                chat_id,
                user,
                &code,
                services,
                scenario_manager,
                state_storage,
                i18n,
            )
            .await;
        }
        CallbackAction::Register(event_id) => {
            events::register_user(&bot, chat_id, &user, event_id, &services, &i18n).await
        }
        CallbackAction::Unregister(event_id) => {
            events::unregister_user(&bot, chat_id, &user, event_id, &services, &i18n).await
        }
        CallbackAction::Ticket(event_id) => events::resend_ticket(&user, event_id, &services).await,
        CallbackAction::Survey { event_id, rating } => {
            handle_survey_rating(&bot, chat_id, &user, event_id, rating, &services, &scenario_manager, &state_storage, &i18n).await
        }
        CallbackAction::ConfirmEvent(confirm) => {
            events::finish_event_creation(&bot, chat_id, &user, confirm, &services, &state_storage, &i18n).await
        }
        CallbackAction::Publish(event_id) => {
            events::publish_event(&bot, chat_id, &user, event_id, &services, &i18n).await
        }
        CallbackAction::RetryJob(job_id) => admin::retry_job(&bot, chat_id, &user, job_id, &services, &i18n).await,
        CallbackAction::AdminStats => admin::send_dashboard(&bot, chat_id, &user, &services, &i18n).await,
        CallbackAction::AdminJobs => admin::send_jobs(&bot, chat_id, &user, &services, &i18n).await,
    };

    report(&bot, chat_id, &i18n, &lang, result).await
}

/// Store a star rating, then offer an optional comment
async fn handle_survey_rating(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    event_id: i64,
    rating: i16,
    services: &ServiceFactory,
    scenario_manager: &ScenarioManager,
    state_storage: &StateStorage,
    i18n: &I18n,
) -> Result<()> {
    services.survey_service.record_rating(user, event_id, rating).await?;
    info!(user_id = user.id, event_id = event_id, rating = rating, "Survey rating recorded");

    let lang = user.language_code.as_str();
    let mut context = state_storage.load_or_new(user.telegram_id).await?;
    let busy = context
        .scenario
        .as_deref()
        .map_or(false, |scenario| !scenario_manager.can_interrupt(scenario));

    if busy {
        bot.send_message(chat_id, i18n.t("surveys.thanks", lang, None)).await?;
        return Ok(());
    }

    scenario_manager.start_scenario(&mut context, SURVEY_COMMENT)?;
    context.set_data("event_id", event_id)?;
    state_storage.save_context(&context).await?;

    let text = format!(
        "{}\n\n{}",
        i18n.t("surveys.thanks", lang, None),
        i18n.t("surveys.ask_comment", lang, None)
    );
    bot.send_message(chat_id, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_data() {
        assert_eq!(CallbackAction::parse("lang:ru"), Some(CallbackAction::Language("ru".to_string())));
        assert_eq!(CallbackAction::parse("register:12"), Some(CallbackAction::Register(12)));
        assert_eq!(CallbackAction::parse("ticket:3"), Some(CallbackAction::Ticket(3)));
        assert_eq!(
            CallbackAction::parse("survey:7:5"),
            Some(CallbackAction::Survey { event_id: 7, rating: 5 })
        );
        assert_eq!(CallbackAction::parse("newevent:confirm"), Some(CallbackAction::ConfirmEvent(true)));
        assert_eq!(CallbackAction::parse("newevent:cancel"), Some(CallbackAction::ConfirmEvent(false)));
        assert_eq!(CallbackAction::parse("job_retry:99"), Some(CallbackAction::RetryJob(99)));
        assert_eq!(CallbackAction::parse("admin:jobs"), Some(CallbackAction::AdminJobs));
    }

    #[test]
    fn test_parse_rejects_malformed_data() {
        assert_eq!(CallbackAction::parse(""), None);
        assert_eq!(CallbackAction::parse("register"), None);
        assert_eq!(CallbackAction::parse("register:abc"), None);
        assert_eq!(CallbackAction::parse("survey:7"), None);
        assert_eq!(CallbackAction::parse("newevent:maybe"), None);
        assert_eq!(CallbackAction::parse("group_setup:1"), None);
    }

    #[test]
    fn test_survey_buttons_round_trip() {
        let keyboard = crate::services::notification::survey_keyboard(4);
        for button in &keyboard.inline_keyboard[0] {
            if let teloxide::types::InlineKeyboardButtonKind::CallbackData(data) = &button.kind {
                assert!(matches!(
                    CallbackAction::parse(data),
                    Some(CallbackAction::Survey { event_id: 4, .. })
                ));
            }
        }
    }
}
