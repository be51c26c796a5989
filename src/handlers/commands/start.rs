//! Start command handler
//!
//! Handles /start, /language and /profile plus the onboarding dialog that
//! asks for a language and the name printed on certificates.

use teloxide::{Bot, types::{Message, InlineKeyboardMarkup, InlineKeyboardButton, ChatId}, prelude::*};
use tracing::{debug, info};
use crate::handlers::{current_user, report};
use crate::i18n::{I18n, params};
use crate::models::User;
use crate::services::ServiceFactory;
use crate::state::{ConversationContext, ScenarioManager, StateStorage};
use crate::state::scenarios::{steps, ONBOARDING};
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::logging::log_user_action;

/// Handle /start command - main entry point for user onboarding
pub async fn handle_start(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    scenario_manager: ScenarioManager,
    state_storage: StateStorage,
    i18n: I18n,
) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    debug!(telegram_id = user.telegram_id, chat_id = ?chat_id, "Processing /start command");

    if !chat_id.is_user() {
        bot.send_message(chat_id, i18n.t("start.private_only", &lang, None)).await?;
        return Ok(());
    }

    if user.full_name.is_some() {
        let text = i18n.t("start.returning_user", &lang, Some(&params([("name", user.display_name())])));
        bot.send_message(chat_id, text).await?;
        return Ok(());
    }

    let mut context = ConversationContext::new(user.telegram_id);
    scenario_manager.start_scenario(&mut context, ONBOARDING)?;
    state_storage.save_context(&context).await?;
    log_user_action(user.id, "onboarding_started", None);

    let text = format!(
        "{}\n\n{}",
        i18n.t("start.new_user_greeting", &lang, None),
        i18n.t("start.choose_language", &lang, None)
    );
    bot.send_message(chat_id, text)
        .reply_markup(language_keyboard(&i18n))
        .await?;
    Ok(())
}

/// Handle /language command
pub async fn handle_language(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;

    bot.send_message(msg.chat.id, i18n.t("start.choose_language", &user.language_code, None))
        .reply_markup(language_keyboard(&i18n))
        .await?;
    Ok(())
}

/// Handle /profile command
pub async fn handle_profile(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = async {
        let registrations = services.event_service.user_registrations(&user).await?;
        let certificates = services.certificate_service.list_for_user(&user).await?;
        let role = services.auth_service.effective_role(&user);

        let text = i18n.t(
            "profile.summary",
            &lang,
            Some(&params([
                ("name", user.display_name()),
                ("role", i18n.t(&format!("roles.{}", role.as_str()), &lang, None)),
                ("language", lang.clone()),
                ("registrations", registrations.len().to_string()),
                ("certificates", certificates.len().to_string()),
            ])),
        );
        bot.send_message(msg.chat.id, text).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Language chosen from the keyboard or typed during onboarding
pub async fn handle_language_choice(
    bot: Bot,
    chat_id: ChatId,
    user: User,
    language_code: &str,
    services: ServiceFactory,
    scenario_manager: ScenarioManager,
    state_storage: StateStorage,
    i18n: I18n,
) -> Result<()> {
    if !i18n.is_language_supported(language_code) {
        let text = i18n.t("onboarding.invalid_language", &user.language_code, None);
        bot.send_message(chat_id, text).await?;
        return Ok(());
    }

    let user = services.user_service.set_language_preference(user.id, language_code).await?;
    let lang = user.language_code.as_str();

    let mut context = state_storage.load_or_new(user.telegram_id).await?;
    if context.is_at(ONBOARDING, steps::LANGUAGE) {
        scenario_manager.next_step(&mut context, steps::FULL_NAME)?;
        state_storage.save_context(&context).await?;
        bot.send_message(chat_id, i18n.t("onboarding.ask_name", lang, None)).await?;
    } else {
        bot.send_message(chat_id, i18n.t("start.language_changed", lang, None)).await?;
    }

    info!(telegram_id = user.telegram_id, language_code = %language_code, "Language selected");
    Ok(())
}

/// Name typed at the last onboarding step
pub async fn handle_name_input(
    bot: Bot,
    msg: Message,
    user: User,
    text: &str,
    services: ServiceFactory,
    scenario_manager: ScenarioManager,
    state_storage: StateStorage,
    i18n: I18n,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let lang = user.language_code.clone();
    let context = state_storage.load_or_new(user.telegram_id).await?;

    if let Err(key) = scenario_manager.validate_input(&context, text) {
        bot.send_message(chat_id, i18n.t(&key, &lang, None)).await?;
        return Ok(());
    }

    match services.user_service.set_full_name(user.id, text).await {
        Ok(user) => {
            state_storage.delete_context(user.telegram_id).await?;
            log_user_action(user.id, "onboarding_completed", None);

            let text = i18n.t("onboarding.completed", &lang, Some(&params([("name", user.display_name())])));
            bot.send_message(chat_id, text).await?;
            Ok(())
        }
        Err(e) => report(&bot, chat_id, &i18n, &lang, Err(e)).await,
    }
}

/// Inline keyboard with one button per supported language
pub fn language_keyboard(i18n: &I18n) -> InlineKeyboardMarkup {
    let row = i18n
        .supported_languages()
        .iter()
        .map(|code| {
            InlineKeyboardButton::callback(
                i18n.t(&format!("languages.{}", code), code, None),
                format!("lang:{}", code),
            )
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}
