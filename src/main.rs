use anyhow::Context;
use tracing_subscriber::EnvFilter;

use expert_match_api::app::{router, AppState};
use expert_match_api::config::{self, RealtimeSource};
use expert_match_api::realtime::ChangeFeed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, BACKEND_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,expert_match_api=debug")),
        )
        .init();

    let config = config::config().clone();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting expert match API in {:?} mode", config.environment);
    if config.integrations.sentry_dsn.is_some() {
        tracing::info!("Error reporting DSN configured");
    }
    if config.integrations.email.is_none() {
        tracing::info!("Email delivery disabled; notifications stay in-app");
    }

    let port = config.server.port;
    let listen_channel = config.realtime.listen_channel.clone();
    let database_feed = config.realtime.source == RealtimeSource::Database;

    let (state, pool) = AppState::from_config(config).await?;

    match (database_feed, pool) {
        (true, Some(pool)) => {
            ChangeFeed::new(pool, listen_channel, state.realtime.clone()).spawn();
        }
        (true, None) => {
            tracing::warn!(
                "Database change feed requested without a database; realtime pushes disabled"
            );
        }
        (false, _) => tracing::info!("Publishing notification changes in-process"),
    }

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
