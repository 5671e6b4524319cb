use std::sync::Arc;

use anyhow::Result;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use nongor::bot::{self, message_handler::command_list};
use nongor::config::AppConfig;
use nongor::db;
use nongor::dialogue::BotState;
use nongor::localization::init_localization;
use nongor::state::AppState;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting Nongor storefront bot");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        admins = config.admin_user_ids.len(),
        ai_enabled = config.ai_enabled(),
        website = %config.website_url,
        "Configuration loaded"
    );

    // Connect to PostgreSQL and create the bot-owned tables
    let pool = db::connect(&config.database_url).await?;
    db::test_connection(&pool).await?;
    db::init_database_schema(&pool).await?;

    init_localization()?;

    let bot = Bot::new(config.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(command_list()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    let state = Arc::new(AppState::new(config, pool, bot.clone())?);
    match state.admins.load().await {
        Ok(count) => info!(table_admins = count, "Admin registry loaded"),
        Err(e) => warn!(error = %e, "Failed to load admins table, using environment admins only"),
    }

    state.start_services();
    info!("Background services started, starting dispatcher");

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![Arc::clone(&state), InMemStorage::<BotState>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    state.stop_services();
    state.pool.close().await;
    info!("Bot stopped");
    Ok(())
}
