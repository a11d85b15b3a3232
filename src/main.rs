//! Anonimka bot
//!
//! Main application entry point

use std::sync::Arc;
use teloxide::{prelude::*, types::Update};
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::utils::command::BotCommands as TeloxideBotCommands;
use tracing::{error, info, warn};

use anonimka::{
    config::Settings,
    database::{connection, DatabaseService},
    handlers::{self, HandlerResult},
    services::ServiceFactory,
    utils::logging,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging; the guard keeps the file writer alive
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", anonimka::info());

    // Initialize database connection
    info!("Connecting to database...");
    let db_config = connection::DatabaseConfig {
        url: settings.database.url.clone(),
        max_connections: settings.database.max_connections,
        min_connections: settings.database.min_connections,
        ..Default::default()
    };
    let db_pool = connection::create_pool(&db_config).await?;

    // Run database migrations
    connection::run_migrations(&db_pool).await?;

    // Initialize database service
    let database_service = DatabaseService::new(db_pool);

    // Initialize bot
    let bot = Bot::new(&settings.bot.token);

    // Initialize services
    info!("Initializing services...");
    let services = ServiceFactory::new(bot.clone(), settings.clone(), database_service.clone())?;

    let services_arc = Arc::new(services);
    let database_arc = Arc::new(database_service);

    let mut dispatcher = Dispatcher::builder(bot, create_handler())
        .dependencies(dptree::deps![services_arc, database_arc])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd);
        })
        .enable_ctrlc_handler()
        .build();

    info!("Anonimka bot is ready, starting polling...");
    dispatcher.dispatch().await;

    info!("Anonimka bot has been shut down.");
    Ok(())
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<BotCommands>()
                        .endpoint(handle_commands),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.successful_payment().is_some())
                        .endpoint(handle_payment),
                ),
        )
        .branch(Update::filter_pre_checkout_query().endpoint(handle_pre_checkout))
}

#[derive(TeloxideBotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Anonimka Bot Commands")]
enum BotCommands {
    #[command(description = "Create or open your account")]
    Start,
    #[command(description = "Show your tier and referrals")]
    Status,
    #[command(description = "Buy a PRO subscription")]
    Premium,
    #[command(description = "Show help information")]
    Help,
}

/// Handle bot commands
async fn handle_commands(
    bot: Bot,
    msg: Message,
    cmd: BotCommands,
    services: Arc<ServiceFactory>,
    database: Arc<DatabaseService>,
) -> HandlerResult {
    let services = (*services).clone();
    let database = (*database).clone();

    let result = match cmd {
        BotCommands::Start => handlers::handle_start(bot, msg, services, database).await,
        BotCommands::Status => handlers::handle_status(bot, msg, services, database).await,
        BotCommands::Premium => handlers::handle_premium(bot, msg, 1).await,
        BotCommands::Help => handlers::handle_help(bot, msg).await,
    };

    if let Err(e) = result {
        error!(error = %e, "Error handling command");
        return Err(e);
    }

    Ok(())
}

/// Handle completed Stars payments
async fn handle_payment(
    bot: Bot,
    msg: Message,
    services: Arc<ServiceFactory>,
    database: Arc<DatabaseService>,
) -> HandlerResult {
    let services = (*services).clone();
    let database = (*database).clone();

    if let Err(e) = handlers::handle_successful_payment(bot, msg, services, database).await {
        error!(error = %e, "Error handling payment");
        return Err(e);
    }

    Ok(())
}

/// Handle pre-checkout queries
async fn handle_pre_checkout(
    bot: Bot,
    query: teloxide::types::PreCheckoutQuery,
) -> HandlerResult {
    if let Err(e) = handlers::handle_pre_checkout(bot, query).await {
        error!(error = %e, "Error handling pre-checkout query");
        return Err(e);
    }

    Ok(())
}
