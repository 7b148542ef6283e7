//! Desk Relay - support desk intake and operator relay bot
//!
//! Walks clients through a short intake questionnaire, posts the summary
//! to the operators' chat and relays messages in both directions.

mod api;
mod config;
mod db;
mod notify;
mod relay;
mod runtime;
mod state_machine;
mod transport;

use api::{create_router, AppState};
use config::DeskConfig;
use db::Database;
use runtime::{DatabaseStore, ProductionManager, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::telegram::{run_polling, TelegramTransport};
use transport::Supervisor;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "desk_relay=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = DeskConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let operator_chat = config.operator_channel;
    match operator_chat {
        Some(chat_id) => tracing::info!(chat_id, "Operator channel configured"),
        None => tracing::warn!(
            "SUPPORT_GROUP_ID is not set. Summaries and forwarded messages will be dropped."
        ),
    }

    let bot = Bot::new(&config.bot_token);
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let store = Arc::new(DatabaseStore::new(db));

    let manager: Arc<ProductionManager> = Arc::new(ProductionManager::new(
        Arc::clone(&store),
        transport,
        operator_chat,
        config.flow.clone(),
        config.runtime,
    ));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        });
    }

    // Periodic purge of expired sessions and idle runtimes
    let purge_every = (config.runtime.session_ttl / 2).max(Duration::from_secs(1));
    let purge_task = {
        let manager = Arc::clone(&manager);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(purge_every);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => manager.sweep().await,
                }
            }
        })
    };

    // Admin API
    let state = AppState::new(
        Arc::clone(&store) as Arc<dyn SessionStore>,
        operator_chat.is_some(),
    );
    let app = create_router(state).layer(TraceLayer::new_for_http());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(addr = %addr, "Starting admin API");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
        })
    };

    Supervisor::default()
        .run(
            "telegram-polling",
            move || run_polling(bot.clone(), Arc::clone(&manager), operator_chat),
            shutdown.clone(),
        )
        .await;

    if let Err(e) = server.await? {
        tracing::error!(error = %e, "Admin API stopped with an error");
    }
    purge_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
