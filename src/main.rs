//! Application entry point and server initialization
//!
//! Loads configuration, picks the store backend, seeds the bootstrap admin
//! and serves the API until SIGINT/SIGTERM.

use std::sync::Arc;

use chrono::Duration;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rateflow::auth::SessionStore;
use rateflow::config::Config;
use rateflow::database::{AppState, RedbStore};
use rateflow::route::create_app;
use rateflow::seed::seed_admin;
use rateflow::store::Repository;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    let log_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| rateflow::config::DEFAULT_LOG_FILTER.into());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_filter))
        .init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let db = match &config.database_url {
        Some(path) => {
            info!(path = %path, "using redb store");
            Repository::new(Arc::new(RedbStore::open(path)?))
        }
        None => {
            info!("DATABASE_URL not set, using volatile in-memory store");
            Repository::in_memory()
        }
    };

    if let Some(seed) = &config.admin {
        seed_admin(&db, seed)?;
    }

    let sessions = SessionStore::new(Duration::hours(config.session_ttl_hours));
    let state = AppState::new(db, sessions, config.analytics_window_days);

    let app = create_app(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("server running at http://localhost:{}", config.port);

    // Open connections are allowed to finish once a signal arrives.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
