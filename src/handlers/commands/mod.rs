//! Command handlers module
//!
//! This module contains handlers for all bot commands like /start, /help, etc.

pub mod start;
pub mod help;
pub mod events;
pub mod checkin;
pub mod admin;

use teloxide::{Bot, types::Message, utils::command::BotCommands};
use crate::utils::errors::Result;
use crate::services::ServiceFactory;
use crate::state::{ScenarioManager, StateStorage};
use crate::i18n::I18n;

/// All available bot commands
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "EventDesk commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Change language")]
    Language,
    #[command(description = "Show your profile")]
    Profile,
    #[command(description = "List upcoming events")]
    Events,
    #[command(description = "Show an event: /event <id>")]
    Event(String),
    #[command(description = "Register for an event: /register <id>")]
    Register(String),
    #[command(description = "Cancel a registration: /unregister <id>")]
    Unregister(String),
    #[command(description = "Your registrations and tickets")]
    MyTickets,
    #[command(description = "Your certificates")]
    Certificates,
    #[command(description = "Check a certificate: /verify <code>")]
    Verify(String),
    #[command(description = "Create an event (organizers)")]
    NewEvent,
    #[command(description = "Events you organize")]
    MyEvents,
    #[command(description = "Publish a draft: /publish <id>")]
    Publish(String),
    #[command(description = "Cancel an event: /cancelevent <id>")]
    CancelEvent(String),
    #[command(description = "List participants: /participants <id>")]
    Participants(String),
    #[command(description = "Start scanning tickets: /checkin <id>")]
    Checkin(String),
    #[command(description = "Finish the current dialog")]
    Done,
    #[command(description = "Admin panel (admin only)")]
    Admin,
    #[command(description = "Platform statistics: /stats [event id]")]
    Stats(String),
    #[command(description = "Ban a user: /ban <telegram id>")]
    Ban(String),
    #[command(description = "Unban a user: /unban <telegram id>")]
    Unban(String),
    #[command(description = "Change a role: /setrole <telegram id> <role>")]
    SetRole(String),
    #[command(description = "Background job status (admin only)")]
    Jobs,
}

/// Main command dispatcher
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    services: ServiceFactory,
    scenario_manager: ScenarioManager,
    state_storage: StateStorage,
    i18n: I18n,
) -> Result<()> {
    match cmd {
        Command::Start => start::handle_start(bot, msg, services, scenario_manager, state_storage, i18n).await,
        Command::Help => help::handle_help(bot, msg, services, i18n).await,
        Command::Language => start::handle_language(bot, msg, services, i18n).await,
        Command::Profile => start::handle_profile(bot, msg, services, i18n).await,
        Command::Events => events::handle_events_list(bot, msg, services, i18n).await,
        Command::Event(arg) => events::handle_event_details(bot, msg, services, i18n, arg).await,
        Command::Register(arg) => events::handle_register(bot, msg, services, i18n, arg).await,
        Command::Unregister(arg) => events::handle_unregister(bot, msg, services, i18n, arg).await,
        Command::MyTickets => events::handle_my_tickets(bot, msg, services, i18n).await,
        Command::Certificates => events::handle_certificates(bot, msg, services, i18n).await,
        Command::Verify(arg) => events::handle_verify(bot, msg, services, i18n, arg).await,
        Command::NewEvent => {
            events::handle_new_event(bot, msg, services, scenario_manager, state_storage, i18n).await
        }
        Command::MyEvents => events::handle_my_events(bot, msg, services, i18n).await,
        Command::Publish(arg) => events::handle_publish(bot, msg, services, i18n, arg).await,
        Command::CancelEvent(arg) => events::handle_cancel_event(bot, msg, services, i18n, arg).await,
        Command::Participants(arg) => events::handle_participants(bot, msg, services, i18n, arg).await,
        Command::Checkin(arg) => {
            checkin::handle_checkin_start(bot, msg, services, scenario_manager, state_storage, i18n, arg).await
        }
        Command::Done => checkin::handle_done(bot, msg, services, state_storage, i18n).await,
        Command::Admin => admin::handle_admin_panel(bot, msg, services, i18n).await,
        Command::Stats(arg) => admin::handle_stats(bot, msg, services, i18n, arg).await,
        Command::Ban(arg) => admin::handle_ban(bot, msg, services, i18n, arg, true).await,
        Command::Unban(arg) => admin::handle_ban(bot, msg, services, i18n, arg, false).await,
        Command::SetRole(arg) => admin::handle_set_role(bot, msg, services, i18n, arg).await,
        Command::Jobs => admin::handle_jobs(bot, msg, services, i18n).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/start", "eventdesk_bot").unwrap(), Command::Start);
        assert_eq!(
            Command::parse("/register 42", "eventdesk_bot").unwrap(),
            Command::Register("42".to_string())
        );
        assert_eq!(
            Command::parse("/setrole 1001 organizer", "eventdesk_bot").unwrap(),
            Command::SetRole("1001 organizer".to_string())
        );
        assert_eq!(Command::parse("/mytickets", "eventdesk_bot").unwrap(), Command::MyTickets);
        assert_eq!(
            Command::parse("/verify 00000000-0000-0000-0000-000000000000", "eventdesk_bot").unwrap(),
            Command::Verify("00000000-0000-0000-0000-000000000000".to_string())
        );
        assert!(Command::parse("/unknown", "eventdesk_bot").is_err());
    }
}
