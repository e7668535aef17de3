use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use tracklink::bot::api::BotApi;
use tracklink::bot::commands::CommandHandler;
use tracklink::bot::{Bot, Messenger};
use tracklink::config::Config;
use tracklink::dispatcher::Dispatcher;
use tracklink::storage::{SqliteStorage, Storage};
use tracklink::track::{create_track_router, Resolver};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    info!("Using SQLite storage: {}", config.database.url);
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );
    storage.init().await?;
    info!("Database initialized successfully");

    // Chat API client; everything downstream talks through the Messenger seam
    let api = Arc::new(BotApi::new(&config.telegram.token)?);
    let messenger: Arc<dyn Messenger> = Arc::clone(&api) as Arc<dyn Messenger>;

    let handler = CommandHandler::new(
        Arc::clone(&storage),
        Arc::clone(&messenger),
        config.base_url.clone(),
        config.telegram.admin_id,
    );
    let bot = Bot::new(api, handler);

    // Scheduled broadcast dispatcher
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&storage),
        Arc::clone(&messenger),
        config.base_url.clone(),
        Duration::from_secs(config.scheduler.poll_interval_secs),
    ));
    dispatcher.spawn();
    info!(
        "Dispatcher polling for due jobs every {}s",
        config.scheduler.poll_interval_secs
    );

    // Tracking redirect server
    let router = create_track_router(Resolver::new(Arc::clone(&storage)));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Tracking server listening on http://{}", addr);
    info!("   - Redirect endpoint at {}/track?id=...", config.base_url);

    tokio::try_join!(
        async {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .map_err(anyhow::Error::from)
        },
        bot.run_polling(),
    )?;

    Ok(())
}
