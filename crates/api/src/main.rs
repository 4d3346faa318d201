use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use rigforge_db::{AssetStore, MemoryStore, PgAssetStore};
use rigforge_events::{EventBus, EventLog};
use rigforge_pipeline::DeadlineSweeper;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rigforge_api::config::ServerConfig;
use rigforge_api::router::build_app_router;
use rigforge_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Asset store ---
    let store = connect_store(&config).await?;
    tracing::info!(backend = store.backend(), "Asset store ready");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let event_log_handle = tokio::spawn(EventLog::run(event_bus.subscribe()));

    // --- App state ---
    let state = AppState::new(store, Arc::clone(&event_bus), config.clone());

    // Spawn the deadline sweeper (fails processing jobs past their deadline).
    let sweeper_cancel = CancellationToken::new();
    let sweeper = DeadlineSweeper::new(Arc::clone(&state.lifecycle), config.sweep_interval());
    let sweeper_handle = tokio::spawn({
        let cancel = sweeper_cancel.clone();
        async move { sweeper.run(cancel).await }
    });

    tracing::info!("Background services started (event log, deadline sweeper)");

    // --- Router ---
    let app = build_app_router(state)?;

    // --- Start server ---
    let host = config
        .host
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain = config.shutdown_timeout();

    sweeper_cancel.cancel();
    if tokio::time::timeout(drain, sweeper_handle).await.is_err() {
        tracing::warn!("Deadline sweeper did not stop within the shutdown timeout");
    }

    // Dropping the last bus handle closes the channel and ends the event log.
    drop(event_bus);
    match tokio::time::timeout(drain, event_log_handle).await {
        Ok(Ok(logged)) => tracing::info!(logged, "Event log drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Event log task failed"),
        Err(_) => tracing::warn!("Event log did not drain within the shutdown timeout"),
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Install the global subscriber. `LOG_FORMAT=json` selects JSON output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "rigforge_api=debug,rigforge_pipeline=debug,rigforge_events=info,tower_http=debug".into()
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise the in-memory store.
async fn connect_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn AssetStore>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, assets are kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = rigforge_db::create_pool(database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    rigforge_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    rigforge_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(Arc::new(PgAssetStore::new(pool)))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
