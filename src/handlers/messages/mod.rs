//! Message handlers module
//!
//! Routes free text in private chats to the dialog the user is in.

use teloxide::{Bot, types::{ChatId, Message}, prelude::*};
use tracing::debug;
use crate::handlers::commands::{checkin, events, start};
use crate::handlers::{current_user, report};
use crate::i18n::I18n;
use crate::models::User;
use crate::services::ServiceFactory;
use crate::state::{ConversationContext, ScenarioManager, StateStorage};
use crate::state::scenarios::{steps, CHECKIN, EVENT_CREATION, ONBOARDING, SURVEY_COMMENT};
use crate::utils::errors::{EventDeskError, Result};

/// Handle incoming text messages
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    scenario_manager: ScenarioManager,
    state_storage: StateStorage,
    i18n: I18n,
) -> Result<()> {
    let chat_id = msg.chat.id;
    if !chat_id.is_user() {
        return Ok(());
    }
    let (Some(from), Some(text)) = (msg.from.as_ref(), msg.text().or(msg.caption())) else {
        return Ok(());
    };
    let text = text.to_string();
    let user = current_user(&services, from).await?;

    let Some(context) = state_storage.load_context(user.telegram_id).await? else {
        bot.send_message(chat_id, i18n.t("messages.use_commands", &user.language_code, None)).await?;
        return Ok(());
    };

    debug!(
        telegram_id = user.telegram_id,
        scenario = ?context.scenario,
        step = ?context.step,
        "Routing dialog input"
    );

    match context.scenario.as_deref() {
        Some(ONBOARDING) if context.step.as_deref() == Some(steps::LANGUAGE) => {
            let code = text.trim().to_lowercase();
            start::handle_language_choice(bot, chat_id, user, &code, services, scenario_manager, state_storage, i18n).await
        }
        Some(ONBOARDING) => {
            start::handle_name_input(bot, msg, user, &text, services, scenario_manager, state_storage, i18n).await
        }
        Some(EVENT_CREATION) => {
            events::handle_event_creation_input(
                bot,
                chat_id,
                user,
                &text,
                context,
                services,
                scenario_manager,
                state_storage,
                i18n,
            )
            .await
        }
        Some(CHECKIN) => checkin::handle_scan(bot, chat_id, user, &text, context, services, i18n).await,
        Some(SURVEY_COMMENT) => {
            handle_survey_comment(bot, chat_id, user, &text, context, services, scenario_manager, state_storage, i18n).await
        }
        _ => {
            state_storage.delete_context(user.telegram_id).await?;
            bot.send_message(chat_id, i18n.t("messages.use_commands", &user.language_code, None)).await?;
            Ok(())
        }
    }
}

/// Optional free-text comment after a star rating
async fn handle_survey_comment(
    bot: Bot,
    chat_id: ChatId,
    user: User,
    text: &str,
    context: ConversationContext,
    services: ServiceFactory,
    scenario_manager: ScenarioManager,
    state_storage: StateStorage,
    i18n: I18n,
) -> Result<()> {
    let lang = user.language_code.clone();

    if scenario_manager.is_skip(&context, text) {
        state_storage.delete_context(user.telegram_id).await?;
        bot.send_message(chat_id, i18n.t("surveys.comment_skipped", &lang, None)).await?;
        return Ok(());
    }
    if let Err(key) = scenario_manager.validate_input(&context, text) {
        bot.send_message(chat_id, i18n.t(&key, &lang, None)).await?;
        return Ok(());
    }

    let result = async {
        let event_id = context.require::<i64>("event_id")?;
        services.survey_service.add_comment(&user, event_id, text).await?;
        state_storage.delete_context(user.telegram_id).await?;
        bot.send_message(chat_id, i18n.t("surveys.comment_saved", &lang, None)).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, chat_id, &i18n, &lang, result).await
}
