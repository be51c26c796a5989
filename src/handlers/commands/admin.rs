//! Admin command handlers

use teloxide::{Bot, types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message}, prelude::*};
use tracing::{debug, info};
use crate::handlers::{current_user, id_argument, report};
use crate::i18n::{I18n, params};
use crate::models::{Dashboard, EventStats, SurveySummary, User, UserRole};
use crate::services::ServiceFactory;
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::helpers::{format_timestamp, truncate_text};
use crate::utils::logging::log_admin_action;

const FAILED_JOBS_SHOWN: i64 = 10;

/// Handle /admin command - show admin panel
pub async fn handle_admin_panel(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    debug!(user_id = user.id, chat_id = ?msg.chat.id, "Processing /admin command");

    let result = async {
        services.auth_service.require_admin_panel(&user)?;

        let keyboard = InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback(i18n.t("admin.statistics_button", &lang, None), "admin:stats"),
            InlineKeyboardButton::callback(i18n.t("admin.jobs_button", &lang, None), "admin:jobs"),
        ]]);
        bot.send_message(msg.chat.id, i18n.t("admin.panel_title", &lang, None))
            .reply_markup(keyboard)
            .await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Handle /stats [event id]
pub async fn handle_stats(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n, arg: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = if arg.trim().is_empty() {
        send_dashboard(&bot, msg.chat.id, &user, &services, &i18n).await
    } else {
        send_event_stats(&bot, msg.chat.id, &user, &arg, &services, &i18n).await
    };
    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Platform overview; shared with the admin panel button
pub async fn send_dashboard(bot: &Bot, chat_id: ChatId, user: &User, services: &ServiceFactory, i18n: &I18n) -> Result<()> {
    services.auth_service.require_admin_panel(user)?;
    let dashboard = services.analytics_service.dashboard().await?;

    bot.send_message(chat_id, render_dashboard(i18n, &user.language_code, &dashboard)).await?;
    Ok(())
}

async fn send_event_stats(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    arg: &str,
    services: &ServiceFactory,
    i18n: &I18n,
) -> Result<()> {
    let event_id = id_argument(arg)?;
    let event = services.event_service.get_event(event_id).await?;
    services.auth_service.require_event_manager(user, &event)?;

    let stats = services.analytics_service.event_stats(event_id).await?;
    let survey = services.survey_service.summary(event_id).await?;

    bot.send_message(chat_id, render_event_stats(i18n, &user.language_code, &stats, &survey)).await?;
    Ok(())
}

/// Handle /ban and /unban
pub async fn handle_ban(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    i18n: I18n,
    arg: String,
    banned: bool,
) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let admin = current_user(&services, from).await?;
    let lang = admin.language_code.clone();

    let result = async {
        services.auth_service.require_admin(&admin)?;
        let target_telegram_id = id_argument(&arg)?;

        let target = services.user_service.set_ban_status(&admin, target_telegram_id, banned).await?;
        services.analytics_service.invalidate().await;

        let key = if banned { "admin.user_banned" } else { "admin.user_unbanned" };
        let text = i18n.t(key, &lang, Some(&params([("name", target.display_name())])));
        bot.send_message(msg.chat.id, text).await?;

        info!(admin_id = admin.id, target_telegram_id = target_telegram_id, banned = banned, "Ban status changed");
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Handle /setrole <telegram id> <role>
pub async fn handle_set_role(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n, arg: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let admin = current_user(&services, from).await?;
    let lang = admin.language_code.clone();

    let result = async {
        services.auth_service.require_admin(&admin)?;
        let (target_telegram_id, role) = parse_set_role(&arg)?;

        let target = services.user_service.set_role(&admin, target_telegram_id, role).await?;
        services.analytics_service.invalidate().await;

        let text = i18n.t(
            "admin.role_changed",
            &lang,
            Some(&params([
                ("name", target.display_name()),
                ("role", i18n.t(&format!("roles.{}", role.as_str()), &lang, None)),
            ])),
        );
        bot.send_message(msg.chat.id, text).await?;
        Ok::<(), EventDeskError>(())
    }
    .await;

    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Handle /jobs
pub async fn handle_jobs(bot: Bot, msg: Message, services: ServiceFactory, i18n: I18n) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = current_user(&services, from).await?;
    let lang = user.language_code.clone();

    let result = send_jobs(&bot, msg.chat.id, &user, &services, &i18n).await;
    report(&bot, msg.chat.id, &i18n, &lang, result).await
}

/// Queue counters plus the latest failures with retry buttons
pub async fn send_jobs(bot: &Bot, chat_id: ChatId, user: &User, services: &ServiceFactory, i18n: &I18n) -> Result<()> {
    services.auth_service.require_admin_panel(user)?;
    let lang = user.language_code.as_str();

    let repository = services.job_queue.repository();
    let counts = repository.counts_by_status().await?;
    let failed = repository.list_failed(FAILED_JOBS_SHOWN).await?;

    let mut lines = vec![i18n.t(
        "admin.jobs_summary",
        lang,
        Some(&params([
            ("pending", counts.pending),
            ("processing", counts.processing),
            ("completed", counts.completed),
            ("failed", counts.failed),
        ])),
    )];
    let mut keyboard = Vec::new();
    for job in &failed {
        lines.push(format!(
            "#{} {} ({}/{})\n{}",
            job.id,
            job.kind,
            job.attempts,
            job.max_attempts,
            truncate_text(job.last_error.as_deref().unwrap_or("-"), 120)
        ));
        keyboard.push(vec![InlineKeyboardButton::callback(
            i18n.t("admin.retry_job_button", lang, Some(&params([("job_id", job.id)]))),
            format!("job_retry:{}", job.id),
        )]);
    }

    bot.send_message(chat_id, lines.join("\n\n"))
        .reply_markup(InlineKeyboardMarkup::new(keyboard))
        .await?;
    Ok(())
}

/// Put a failed job back in the queue
pub async fn retry_job(bot: &Bot, chat_id: ChatId, user: &User, job_id: i64, services: &ServiceFactory, i18n: &I18n) -> Result<()> {
    services.auth_service.require_admin(user)?;

    let job = services
        .job_queue
        .repository()
        .retry_failed(job_id)
        .await?
        .ok_or_else(|| EventDeskError::InvalidStateTransition {
            from: "not failed".to_string(),
            to: "pending".to_string(),
        })?;
    log_admin_action(user.id, "retry_job", Some(&job.id.to_string()), Some(&job.kind));

    let text = i18n.t("admin.job_requeued", &user.language_code, Some(&params([("job_id", job.id)])));
    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// Split "<telegram id> <role>"
pub fn parse_set_role(arg: &str) -> Result<(i64, UserRole)> {
    let mut parts = arg.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(role), None) => Ok((id_argument(id)?, role.parse()?)),
        _ => Err(EventDeskError::InvalidInput("Usage: /setrole <telegram id> <role>".to_string())),
    }
}

pub fn render_dashboard(i18n: &I18n, lang: &str, dashboard: &Dashboard) -> String {
    let overview = &dashboard.overview;
    let mut text = i18n.t(
        "admin.dashboard",
        lang,
        Some(&params([
            ("users", overview.total_users.to_string()),
            ("banned", overview.banned_users.to_string()),
            ("organizers", overview.organizers.to_string()),
            ("published", overview.published_events.to_string()),
            ("drafts", overview.draft_events.to_string()),
            ("cancelled", overview.cancelled_events.to_string()),
            ("registrations", overview.active_registrations.to_string()),
            ("checkins", overview.check_ins.to_string()),
            ("certificates", overview.certificates.to_string()),
            ("responses", overview.survey_responses.to_string()),
            ("rating", format_rating(overview.average_rating)),
            ("generated_at", format_timestamp(dashboard.generated_at)),
        ])),
    );

    for stats in &dashboard.top_events {
        text.push_str("\n\n");
        text.push_str(&format!(
            "#{} {}: {}/{}, {} {}",
            stats.event_id,
            stats.title,
            stats.attended,
            stats.current_participants,
            format_rate(stats.attendance_rate()),
            format_rating(stats.average_rating)
        ));
    }
    text
}

pub fn render_event_stats(i18n: &I18n, lang: &str, stats: &EventStats, survey: &SurveySummary) -> String {
    i18n.t(
        "admin.event_stats",
        lang,
        Some(&params([
            ("event_id", stats.event_id.to_string()),
            ("title", stats.title.clone()),
            ("starts_at", format_timestamp(stats.starts_at)),
            ("participants", stats.current_participants.to_string()),
            (
                "capacity",
                stats
                    .max_participants
                    .map(|max| max.to_string())
                    .unwrap_or_else(|| i18n.t("events.unlimited", lang, None)),
            ),
            ("attended", stats.attended.to_string()),
            ("attendance_rate", format_rate(stats.attendance_rate())),
            ("responses", survey.responses.to_string()),
            ("rating", format_rating(survey.average_rating)),
        ])),
    )
}

fn format_rating(rating: Option<f64>) -> String {
    rating.map_or_else(|| "-".to_string(), |r| format!("{:.1}⭐", r))
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{:.0}%", r))
}
