//! Event command handlers
//!
//! Participant commands (browse, register, tickets, certificates) and the
//! organizer commands, including the step-by-step event creation dialog.

use teloxide::{Bot, types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message}, prelude::*};
use tracing::{debug, info};
use crate::handlers::{current_user, id_argument, report};
use crate::i18n::{I18n, params};
use crate::models::{Event, RegistrationStatus, User};
use crate::services::{EventDraft, ServiceFactory};
use crate::state::{ConversationContext, ScenarioManager, StateStorage};
use crate::state::scenarios::{steps, EVENT_CREATION};
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::helpers::{combine_date_time, format_timestamp, normalize_whitespace, truncate_text};

const MAX_MESSAGE_CHARS: usize = 4000;

/// Handle /events command
pub async fn handle_events_list(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.as_str();

    let events = services.event_service.list_upcoming().await?;
    if events.is_empty() {
        bot.send_message(msg.chat.id, i18n.t("events.none_upcoming", lang, None)).await?;
        return Ok(());
    }

    let mut lines = vec![i18n.t("events.upcoming_header", lang, None)];
    let mut keyboard = Vec::new();
    for event in &events {
        lines.push(event_line(&i18n, lang, event));
        if !event.is_full() {
            keyboard.push(vec![InlineKeyboardButton::callback(
                i18n.t("events.register_button", lang, Some(&params([("title", truncate_text(&event.title, 30))]))),
                format!("register:{}", event.id),
            )]);
        }
    }

    bot.send_message(msg.chat.id, truncate_text(&lines.join("\n\n"), MAX_MESSAGE_CHARS))
        .reply_markup(InlineKeyboardMarkup::new(keyboard))
        .await?;
    Ok(())
}

/// Handle /event <id>
pub async fn handle_event_details(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n, arg: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = async {
        let event_id = id_argument(&arg)?;
        let event = services.event_service.get_event(event_id).await?;

        let mut text = event_details(&i18n, &lang, &event);
        if let Some(registration) = services.database.registrations.find_for_user(event_id, user.id).await? {
            text.push_str("\n\n");
            text.push_str(&i18n.t(&format!("registrations.status.{}", registration.status.as_str()), &lang, None));
        }

        let mut request = bot.send_message(msg.chat.id, text);
        if !event.is_full() && event.status == crate::models::EventStatus::Published {
            request = request.reply_markup(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
                i18n.t("events.register_button", &lang, Some(&params([("title", truncate_text(&event.title, 30))]))),
                format!("register:{}", event.id),
            )]]));
        }
        request.await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Handle /register <id>
pub async fn handle_register(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n, arg: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = match id_argument(&arg) {
        Ok(event_id) => register_user(&bot, msg.chat.id, &user, event_id, &services, &i18n).await,
        Err(e) => Err(e),
    };
    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Take a place and deliver the ticket; shared with the register button
pub async fn register_user(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    event_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
) -> Result<()> {
    let (registration, event) = services.event_service.register(user, event_id).await?;
    let lang = user.language_code.as_str();

    let text = i18n.t(
        "registrations.confirmed",
        lang,
        Some(&params([
            ("title", event.title.clone()),
            ("starts_at", format_timestamp(event.starts_at)),
        ])),
    );
    bot.send_message(chat_id, text).await?;

    let token = services.ticket_service.issue(&registration, &event)?;
    let png = services.ticket_service.render_qr(&token)?;
    services.notification_service.send_ticket(user, &event, png).await?;

    info!(user_id = user.id, event_id = event.id, registration_id = registration.id, "Ticket delivered");
    Ok(())
}

/// Handle /unregister <id>
pub async fn handle_unregister(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n, arg: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = match id_argument(&arg) {
        Ok(event_id) => unregister_user(&bot, msg.chat.id, &user, event_id, &services, &i18n).await,
        Err(e) => Err(e),
    };
    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

pub async fn unregister_user(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    event_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
) -> Result<()> {
    services.event_service.cancel_registration(user, event_id).await?;
    let event = services.event_service.get_event(event_id).await?;

    let text = i18n.t("registrations.cancelled", &user.language_code, Some(&params([("title", event.title)])));
    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// Handle /mytickets
pub async fn handle_my_tickets(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.as_str();

    let registrations = services.event_service.user_registrations(&user).await?;
    if registrations.is_empty() {
        bot.send_message(msg.chat.id, i18n.t("registrations.none", lang, None)).await?;
        return Ok(());
    }

    let mut lines = vec![i18n.t("registrations.header", lang, None)];
    let mut keyboard = Vec::new();
    for entry in &registrations {
        lines.push(format!(
            "#{} {} ({})\n{}",
            entry.event_id,
            entry.title,
            format_timestamp(entry.starts_at),
            i18n.t(&format!("registrations.status.{}", entry.status.as_str()), lang, None)
        ));
        if entry.status == RegistrationStatus::Registered {
            keyboard.push(vec![
                InlineKeyboardButton::callback(
                    i18n.t("tickets.resend_button", lang, Some(&params([("event_id", entry.event_id)]))),
                    format!("ticket:{}", entry.event_id),
                ),
                InlineKeyboardButton::callback(
                    i18n.t("registrations.cancel_button", lang, None),
                    format!("unregister:{}", entry.event_id),
                ),
            ]);
        }
    }

    bot.send_message(msg.chat.id, truncate_text(&lines.join("\n\n"), MAX_MESSAGE_CHARS))
        .reply_markup(InlineKeyboardMarkup::new(keyboard))
        .await?;
    Ok(())
}

/// Re-issue the QR ticket of an active registration
pub async fn resend_ticket(user: &User, event_id: i64, services: &ServiceFactory) -> Result<()> {
    let registration = services
        .database
        .registrations
        .find_for_user(event_id, user.id)
        .await?
        .filter(|r| r.status == RegistrationStatus::Registered)
        .ok_or(EventDeskError::NotRegistered { event_id, user_id: user.id })?;
    let event = services.event_service.get_event(event_id).await?;

    let token = services.ticket_service.issue(&registration, &event)?;
    let png = services.ticket_service.render_qr(&token)?;
    services.notification_service.send_ticket(user, &event, png).await?;

    debug!(user_id = user.id, event_id = event_id, "Ticket re-sent");
    Ok(())
}

/// Handle /certificates
pub async fn handle_certificates(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.as_str();

    let certificates = services.certificate_service.list_for_user(&user).await?;
    if certificates.is_empty() {
        bot.send_message(msg.chat.id, i18n.t("certificates.none", lang, None)).await?;
        return Ok(());
    }

    let mut lines = vec![i18n.t("certificates.header", lang, None)];
    for certificate in &certificates {
        lines.push(i18n.t(
            "certificates.list_item",
            lang,
            Some(&params([
                ("number", certificate.certificate_number.clone()),
                ("title", certificate.event_title.clone()),
                ("issued_at", format_timestamp(certificate.issued_at)),
                ("code", certificate.verification_code.to_string()),
            ])),
        ));
    }

    bot.send_message(msg.chat.id, truncate_text(&lines.join("\n\n"), MAX_MESSAGE_CHARS)).await?;
    Ok(())
}

/// Handle /verify: look up a certificate by its verification code
pub async fn handle_verify(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n, arg: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = async {
        if arg.trim().is_empty() {
            return Err(EventDeskError::InvalidInput("Missing verification code".to_string()));
        }
        let text = match services.certificate_service.verify(&arg).await? {
            Some(found) => i18n.t(
                "certificates.verified",
                &lang,
                Some(&params([
                    ("number", found.certificate.certificate_number.clone()),
                    ("name", found.holder_name.clone()),
                    ("title", found.event_title.clone()),
                    ("starts_at", format_timestamp(found.event_starts_at)),
                    ("issued_at", format_timestamp(found.certificate.issued_at)),
                ])),
            ),
            None => i18n.t("certificates.not_found", &lang, None),
        };
        bot.send_message(msg.chat.id, text).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;
    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Handle /newevent: start the creation dialog
pub async fn handle_new_event(
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
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = async {
        services.auth_service.require_active(&user)?;
        services.auth_service.require_organizer(&user)?;

        let mut context = state_storage.load_or_new(user.telegram_id).await?;
        scenario_manager.start_scenario(&mut context, EVENT_CREATION)?;
        state_storage.save_context(&context).await?;

        bot.send_message(msg.chat.id, i18n.t("events.create.ask_title", &lang, None)).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Text typed while the creation dialog is active
pub async fn handle_event_creation_input(
    bot: Bot,
    chat_id: ChatId,
    user: User,
    text: &str,
    mut context: ConversationContext,
    services: ServiceFactory,
    scenario_manager: ScenarioManager,
    state_storage: StateStorage,
    i18n: I18n,
) -> Result<()> {
    let lang = user.language_code.clone();
    let step = context.step.clone().unwrap_or_default();

    if step == steps::CONFIRMATION {
        return match text.trim().to_lowercase().as_str() {
            "confirm" | "yes" | "да" => finish_event_creation(&bot, chat_id, &user, true, &services, &state_storage, &i18n).await,
            "cancel" | "no" | "нет" => finish_event_creation(&bot, chat_id, &user, false, &services, &state_storage, &i18n).await,
            _ => {
                bot.send_message(chat_id, i18n.t("events.create.confirm_hint", &lang, None)).await?;
                Ok(())
            }
        };
    }

    if let Err(key) = scenario_manager.validate_input(&context, text) {
        bot.send_message(chat_id, i18n.t(&key, &lang, None)).await?;
        return Ok(());
    }

    if !scenario_manager.is_skip(&context, text) {
        let value = if step == steps::DESCRIPTION {
            text.trim().to_string()
        } else {
            normalize_whitespace(text)
        };
        context.set_data(&step, value)?;
    }

    if step == steps::END_TIME {
        if let Err(key) = check_time_order(&context) {
            bot.send_message(chat_id, i18n.t(key, &lang, None)).await?;
            return Ok(());
        }
    }

    let next = scenario_manager
        .get_current_step(&context)?
        .next_steps
        .first()
        .cloned()
        .ok_or_else(|| EventDeskError::InvalidInput(format!("Step {} has no successor", step)))?;
    scenario_manager.next_step(&mut context, &next)?;
    state_storage.save_context(&context).await?;

    if next == steps::CONFIRMATION {
        let draft = draft_from_context(&context)?;
        bot.send_message(chat_id, draft_summary(&i18n, &lang, &draft))
            .reply_markup(confirmation_keyboard(&i18n, &lang))
            .await?;
    } else {
        bot.send_message(chat_id, i18n.t(&format!("events.create.ask_{}", next), &lang, None)).await?;
    }
    Ok(())
}

/// Create the event from the dialog data, or drop the dialog
pub async fn finish_event_creation(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    confirm: bool,
    services: &ServiceFactory,
    state_storage: &StateStorage,
    i18n: &I18n,
) -> Result<()> {
    let lang = user.language_code.as_str();
    let context = state_storage.load_or_new(user.telegram_id).await?;
    if !context.is_at(EVENT_CREATION, steps::CONFIRMATION) {
        return report(
            bot,
            chat_id,
            i18n,
            lang,
            Err(EventDeskError::InvalidStateTransition {
                from: context.step.clone().unwrap_or_else(|| "none".to_string()),
                to: steps::CONFIRMATION.to_string(),
            }),
        )
        .await;
    }

    state_storage.delete_context(user.telegram_id).await?;
    if !confirm {
        bot.send_message(chat_id, i18n.t("events.create.cancelled", lang, None)).await?;
        return Ok(());
    }

    let created = match draft_from_context(&context) {
        Ok(draft) => services.event_service.create_event(user, draft).await,
        Err(e) => Err(e),
    };
    let event = match created {
        Ok(event) => event,
        Err(e) => return report(bot, chat_id, i18n, lang, Err(e)).await,
    };

    let text = i18n.t(
        "events.create.created",
        lang,
        Some(&params([("event_id", event.id.to_string()), ("title", event.title.clone())])),
    );
    bot.send_message(chat_id, text)
        .reply_markup(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
            i18n.t("events.publish_button", lang, None),
            format!("publish:{}", event.id),
        )]]))
        .await?;
    Ok(())
}

/// Handle /myevents
pub async fn handle_my_events(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = async {
        services.auth_service.require_organizer(&user)?;
        let events = services.event_service.list_by_organizer(&user).await?;
        if events.is_empty() {
            bot.send_message(msg.chat.id, i18n.t("events.none_organized", &lang, None)).await?;
            return Ok(());
        }

        let lines = events
            .iter()
            .map(|event| {
                format!(
                    "{}\n{}",
                    event_line(&i18n, &lang, event),
                    i18n.t(&format!("events.status.{}", event.status.as_str()), &lang, None)
                )
            })
            .collect::<Vec<_>>();
        bot.send_message(msg.chat.id, truncate_text(&lines.join("\n\n"), MAX_MESSAGE_CHARS)).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Handle /publish <id>
pub async fn handle_publish(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n, arg: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = match id_argument(&arg) {
        Ok(event_id) => publish_event(&bot, msg.chat.id, &user, event_id, &services, &i18n).await,
        Err(e) => Err(e),
    };
    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

pub async fn publish_event(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    event_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
) -> Result<()> {
    let event = services.event_service.publish_event(user, event_id).await?;
    services.analytics_service.invalidate().await;

    let text = i18n.t(
        "events.published",
        &user.language_code,
        Some(&params([("event_id", event.id.to_string()), ("title", event.title)])),
    );
    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// Handle /cancelevent <id>
pub async fn handle_cancel_event(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n, arg: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = async {
        let event_id = id_argument(&arg)?;
        let event = services.event_service.cancel_event(&user, event_id).await?;
        services.analytics_service.invalidate().await;

        let text = i18n.t("events.cancelled", &lang, Some(&params([("title", event.title)])));
        bot.send_message(msg.chat.id, text).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Handle /participants <id>
pub async fn handle_participants(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n, arg: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = async {
        let event_id = id_argument(&arg)?;
        let (event, participants) = services.event_service.list_participants(&user, event_id).await?;

        let mut lines = vec![i18n.t(
            "events.participants_header",
            &lang,
            Some(&params([
                ("title", event.title.clone()),
                ("count", event.current_participants.to_string()),
                ("capacity", capacity_label(&i18n, &lang, &event)),
            ])),
        )];
        for (index, participant) in participants.iter().enumerate() {
            let status = i18n.t(&format!("registrations.status.{}", participant.status.as_str()), &lang, None);
            lines.push(format!("{}. {}: {}", index + 1, participant.display_name(), status));
        }

        bot.send_message(msg.chat.id, truncate_text(&lines.join("\n"), MAX_MESSAGE_CHARS)).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// One-paragraph listing entry
fn event_line(i18n: &I18n, lang: &str, event: &Event) -> String {
    let places = match event.remaining_places() {
        Some(0) => i18n.t("events.full", lang, None),
        Some(left) => i18n.tp("events.places", lang, left as i64, None),
        None => i18n.t("events.unlimited", lang, None),
    };
    format!(
        "#{} {}\n{} | {}",
        event.id,
        event.title,
        format_timestamp(event.starts_at),
        places
    )
}

fn event_details(i18n: &I18n, lang: &str, event: &Event) -> String {
    i18n.t(
        "events.details",
        lang,
        Some(&params([
            ("event_id", event.id.to_string()),
            ("title", event.title.clone()),
            ("description", event.description.clone().unwrap_or_default()),
            ("venue", event.venue.clone().unwrap_or_else(|| "-".to_string())),
            ("starts_at", format_timestamp(event.starts_at)),
            ("ends_at", format_timestamp(event.ends_at)),
            ("participants", event.current_participants.to_string()),
            ("capacity", capacity_label(i18n, lang, event)),
            ("status", i18n.t(&format!("events.status.{}", event.status.as_str()), lang, None)),
        ])),
    )
}

fn capacity_label(i18n: &I18n, lang: &str, event: &Event) -> String {
    event
        .max_participants
        .map(|max| max.to_string())
        .unwrap_or_else(|| i18n.t("events.unlimited", lang, None))
}

/// Build the event input from the values collected by the dialog
pub fn draft_from_context(context: &ConversationContext) -> Result<EventDraft> {
    let date: String = context.require(steps::DATE)?;
    let starts_at = combine_date_time(&date, &context.require::<String>(steps::START_TIME)?)?;
    let ends_at = combine_date_time(&date, &context.require::<String>(steps::END_TIME)?)?;
    let max_participants = match context.get_string(steps::CAPACITY) {
        Some(raw) => Some(
            raw.trim()
                .parse::<i32>()
                .map_err(|_| EventDeskError::InvalidInput(format!("Invalid capacity: {}", raw)))?,
        ),
        None => None,
    };

    Ok(EventDraft {
        title: context.require(steps::TITLE)?,
        description: context.get_string(steps::DESCRIPTION),
        venue: context.get_string(steps::VENUE),
        starts_at,
        ends_at,
        max_participants,
    })
}

/// End time must come after the start time on the same day
fn check_time_order(context: &ConversationContext) -> std::result::Result<(), &'static str> {
    let (Some(date), Some(start), Some(end)) = (
        context.get_string(steps::DATE),
        context.get_string(steps::START_TIME),
        context.get_string(steps::END_TIME),
    ) else {
        return Ok(());
    };

    match (combine_date_time(&date, &start), combine_date_time(&date, &end)) {
        (Ok(starts_at), Ok(ends_at)) if ends_at > starts_at => Ok(()),
        _ => Err("events.create.invalid_end_time"),
    }
}

fn draft_summary(i18n: &I18n, lang: &str, draft: &EventDraft) -> String {
    i18n.t(
        "events.create.summary",
        lang,
        Some(&params([
            ("title", draft.title.clone()),
            ("description", draft.description.clone().unwrap_or_else(|| "-".to_string())),
            ("venue", draft.venue.clone().unwrap_or_else(|| "-".to_string())),
            ("starts_at", format_timestamp(draft.starts_at)),
            ("ends_at", format_timestamp(draft.ends_at)),
            (
                "capacity",
                draft
                    .max_participants
                    .map(|max| max.to_string())
                    .unwrap_or_else(|| i18n.t("events.unlimited", lang, None)),
            ),
        ])),
    )
}

fn confirmation_keyboard(i18n: &I18n, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(i18n.t("buttons.confirm", lang, None), "newevent:confirm"),
        InlineKeyboardButton::callback(i18n.t("buttons.cancel", lang, None), "newevent:cancel"),
    ]])
}
