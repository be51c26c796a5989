//! Help command handler

use teloxide::{Bot, types::Message, prelude::*};
use crate::handlers::current_user;
use crate::i18n::I18n;
use crate::services::ServiceFactory;
use crate::utils::errors::Result;

/// Handle /help command; organizer and admin sections only for those roles
pub async fn handle_help(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.as_str();

    let mut sections = vec![i18n.t("help.participant", lang, None)];
    if services.auth_service.can_organize(&user) {
        sections.push(i18n.t("help.organizer", lang, None));
    }
    if services.auth_service.is_admin(&user) {
        sections.push(i18n.t("help.admin", lang, None));
    }

    bot.send_message(msg.chat.id, sections.join("\n\n")).await?;
    Ok(())
}
