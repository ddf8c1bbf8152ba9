use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::task::JoinHandle;
use tracing::{error, info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use fish_shop_bot::bot::{self, ShopController};
use fish_shop_bot::commerce::MoltinClient;
use fish_shop_bot::config::BotConfig;
use fish_shop_bot::localization::init_localization;
use fish_shop_bot::log_forwarder::{spawn_forwarder, TelegramLogLayer, OPERATOR_TARGET};
use fish_shop_bot::store::{KeyValueStore, RedisStore};

/// Install the tracing subscriber; returns the log forwarding task when enabled
fn init_logging(config: &BotConfig) -> Option<JoinHandle<()>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = config
        .json_logs
        .then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!config.json_logs).then(|| tracing_subscriber::fmt::layer());

    let (telegram_layer, forwarder) = match &config.log_forward {
        Some(forward) => {
            let (layer, receiver) = TelegramLogLayer::new(Level::WARN);
            let logging_bot = Bot::new(forward.bot_token.clone());
            let handle = spawn_forwarder(logging_bot, ChatId(forward.chat_id), receiver);
            (Some(layer), Some(handle))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(telegram_layer)
        .init();

    forwarder
}

/// Run the dispatcher until Ctrl-C; a panic inside surfaces as a join error
async fn run_dispatcher(bot: Bot, controller: Arc<ShopController>) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![controller])
        .error_handler(Arc::new(|e: anyhow::Error| async move {
            error!(error = %format!("{e:#}"), "Update handler failed");
        }))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid configuration")?;
    let _forwarder = init_logging(&config);

    info!(target: OPERATOR_TARGET, "Starting Fish Shop Telegram Bot");

    init_localization()?;

    let store: Arc<dyn KeyValueStore> = Arc::new(
        RedisStore::connect(&config.redis_url)
            .await
            .context("Failed to connect to Redis")?,
    );

    let storefront = MoltinClient::new(
        config.commerce.clone(),
        config.recovery.clone(),
        Arc::clone(&store),
    )?;
    let controller = Arc::new(ShopController::new(Arc::new(storefront), store));

    let bot = Bot::new(config.bot_token.clone());

    info!("Bot initialized, starting dispatcher");

    loop {
        let dispatcher = tokio::spawn(run_dispatcher(bot.clone(), Arc::clone(&controller)));

        match dispatcher.await {
            Ok(()) => {
                info!("Dispatcher stopped, shutting down");
                break;
            }
            Err(e) => {
                error!(
                    error = %e,
                    restart_in_secs = config.restart_delay.as_secs(),
                    "Shop bot crashed, restarting"
                );
                tokio::time::sleep(config.restart_delay).await;
            }
        }
    }

    Ok(())
}
