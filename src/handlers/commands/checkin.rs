//! Check-in handlers
//!
//! `/checkin <id>` puts the organizer into scanning mode for one event;
//! every text received afterwards is treated as a scanned ticket until
//! `/done`.

use teloxide::{Bot, types::{ChatId, Message}, prelude::*};
use tracing::info;
use crate::handlers::{current_user, id_argument, report};
use crate::i18n::{I18n, params};
use crate::models::User;
use crate::services::ServiceFactory;
use crate::state::{ConversationContext, ScenarioManager, StateStorage};
use crate::state::scenarios::CHECKIN;
use crate::utils::errors::{EventDeskError, Result};

pub const EVENT_ID_KEY: &str = "event_id";

/// Handle /checkin <id>
pub async fn handle_checkin_start(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    scenario_manager: ScenarioManager,
    state_storage: StateStorage,
    i18n: I18n,
    arg: String,
) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = async {
        let event_id = id_argument(&arg)?;
        let event = services.checkin_service.authorize_scanner(&user, event_id).await?;

        let mut context = state_storage.load_or_new(user.telegram_id).await?;
        scenario_manager.start_scenario(&mut context, CHECKIN)?;
        context.set_data(EVENT_ID_KEY, event.id)?;
        state_storage.save_context(&context).await?;

        info!(user_id = user.id, event_id = event.id, "Check-in mode started");
        let text = i18n.t("checkin.started", &lang, Some(&params([("title", event.title)])));
        bot.send_message(msg.chat.id, text).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// A ticket payload received in scanning mode
///
/// Rejected scans are answered but keep the scanner in scanning mode.
pub async fn handle_scan(
    bot: Bot,
    chat_id: ChatId,
    scanner: User,
    payload: &str,
    context: ConversationContext,
    services: ServiceFactory,
    i18n: I18n,
) -> Result<()> {
    let lang = scanner.language_code.clone();

    let result = async {
        let event_id = context.require::<i64>(EVENT_ID_KEY)?;
        let checked = services.checkin_service.check_in(&scanner, event_id, payload.trim()).await?;

        let key = if checked.outcome.is_first_scan() {
            "checkin.success"
        } else {
            "checkin.already"
        };
        let text = i18n.t(
            key,
            &lang,
            Some(&params([
                ("name", checked.attendee.display_name()),
                ("title", checked.event.title.clone()),
            ])),
        );
        bot.send_message(chat_id, text).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, chat_id, &i18n, &lang, result).await
}

/// Handle /done: leave whatever dialog is active
pub async fn handle_done(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    state_storage: StateStorage,
    i18n: I18n,
) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.as_str();

    let key = match state_storage.load_context(user.telegram_id).await? {
        Some(context) if context.is_in_scenario(CHECKIN) => "checkin.finished",
        Some(_) => "dialog.cancelled",
        None => "dialog.nothing_active",
    };
    state_storage.delete_context(user.telegram_id).await?;

    bot.send_message(msg.chat.id, i18n.t(key, lang, None)).await?;
    Ok(())
}
