// src/main.rs

use quiz_ledger::config::Config;
use quiz_ledger::routes;
use quiz_ledger::services::{attempt::AttemptService, award, pack_session::PackSessionService};
use quiz_ledger::state::AppState;
use quiz_ledger::store::{AttemptLedger, OptionStore, PackSessionStore, PgStore, PointLedger};
use quiz_ledger::utils::retry::RetryConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DB_CONNECT_RETRIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let pool = connect_with_retry(&config).await?;
    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    let store = Arc::new(PgStore::new(pool));
    let ledger: Arc<dyn AttemptLedger> = store.clone();
    let options: Arc<dyn OptionStore> = store.clone();
    let points: Arc<dyn PointLedger> = store.clone();
    let sessions: Arc<dyn PackSessionStore> = store;

    let (awards, award_worker) = award::spawn(
        points.clone(),
        RetryConfig::with_max_attempts(config.award_max_attempts),
    );

    // Pay whatever a previous run left unpaid. Failing here only delays
    // those awards to the next start.
    if let Err(e) = award::redeliver_unpaid(ledger.as_ref(), &awards).await {
        tracing::error!("Failed to re-enqueue unpaid point awards: {}", e);
    }

    let state = AppState {
        attempts: Arc::new(AttemptService::new(ledger, options, awards)),
        packs: Arc::new(PackSessionService::new(sessions)),
        points,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it every award sender) is gone; let queued
    // awards finish before exiting.
    tracing::info!("Server stopped, draining point awards...");
    award_worker.shutdown().await;

    Ok(())
}

async fn connect_with_retry(config: &Config) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > DB_CONNECT_RETRIES {
                    tracing::error!("Failed to connect to database after {} retries", DB_CONNECT_RETRIES);
                    return Err(e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
