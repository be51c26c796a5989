//! EventDesk Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use teloxide::{prelude::*, types::Update};
use teloxide::dispatching::{HandlerExt, UpdateHandler};
use teloxide::utils::command::BotCommands;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use eventdesk::{
    config::Settings,
    database::{connection::{create_pool, run_migrations}, DatabaseService},
    handlers::{handle_callback_query, handle_command, handle_message, Command},
    i18n::I18n,
    jobs::{BotJobHandler, JobPoller},
    middleware::{LoggingMiddleware, RateLimitMiddleware},
    services::{redis::RedisService, ServiceFactory},
    state::{ScenarioManager, StateStorage},
    utils::{errors::EventDeskError, logging},
};

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    if std::env::args().any(|arg| arg == "--print-config") {
        println!("{}", settings.to_toml()?);
        return Ok(());
    }
    settings.validate()?;

    // Held until exit so buffered file logs get flushed
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!(version = eventdesk::VERSION, "Starting EventDesk bot...");

    let db_pool = create_pool(&settings.database).await.context("Failed to connect to database")?;
    run_migrations(&db_pool).await?;
    let database_service = DatabaseService::new(db_pool);

    info!("Connecting to Redis...");
    let redis_service = RedisService::new(settings.redis.clone()).await?;
    let state_storage = StateStorage::new(settings.redis.clone()).await?;
    let scenario_manager = ScenarioManager::new().context("Failed to build conversation scenarios")?;

    info!("Loading translations...");
    let mut i18n = I18n::new(&settings.i18n);
    i18n.load_translations().await?;

    let bot = Bot::new(&settings.bot.token);
    let services = ServiceFactory::new(
        bot.clone(),
        settings.clone(),
        database_service.clone(),
        redis_service,
        i18n.clone(),
    );

    let health = services.health_check().await;
    for issue in health.get_issues() {
        warn!(issue = %issue, "Startup health check");
    }

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    // Background job poller
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let poller = JobPoller::new(
        database_service.jobs.clone(),
        Arc::new(BotJobHandler::new(services.clone())),
        settings.jobs.clone(),
    );
    let poller_handle = tokio::spawn(poller.run(shutdown_rx));

    let rate_limiter = RateLimitMiddleware::new(&settings.rate_limit, settings.bot.admin_ids.clone());
    let cleanup_limiter = rate_limiter.clone();
    let cleanup_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    let mut dispatcher = Dispatcher::builder(bot, create_handler())
        .dependencies(dptree::deps![
            services,
            scenario_manager,
            state_storage,
            i18n,
            rate_limiter,
            LoggingMiddleware::new(settings.logging.log_updates)
        ])
        .default_handler(|upd| async move {
            warn!(update_id = upd.id.0, "Unhandled update");
        })
        .error_handler(LoggingErrorHandler::with_custom_text("Error in update handler"))
        .enable_ctrlc_handler()
        .build();

    info!("EventDesk bot is ready, starting long polling");
    dispatcher.dispatch().await;

    info!("Dispatcher stopped, shutting down background tasks");
    cleanup_handle.abort();
    if shutdown_tx.send(()).await.is_err() {
        warn!("Job poller already stopped");
    }
    if let Err(e) = poller_handle.await {
        error!(error = %e, "Job poller task failed");
    }

    info!("EventDesk bot has been shut down.");
    Ok(())
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<EventDeskError> {
    dptree::entry()
        .inspect(|update: Update, logger: LoggingMiddleware| logger.log_update(&update))
        .filter(|update: Update, limiter: RateLimitMiddleware| limiter.allows(&update))
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint(handle_command))
                .branch(dptree::endpoint(handle_message)),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callback_query))
}
