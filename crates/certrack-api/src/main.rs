//! # certrack-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Binds to `PORT` (default 8080).

use std::sync::Arc;

use anyhow::Context;

use certrack_api::db::{self, PgStore};
use certrack_api::state::{AppConfig, AppState};
use certrack_engine::{ComplianceStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;
    let catalog = config.load_catalog().map_err(|e| {
        tracing::error!("Template catalog failed to load: {e}");
        e
    })?;

    let store: Arc<dyn ComplianceStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::connect(url, config.db_max_connections)
                .await
                .context("database initialization failed")?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; running in-memory only, state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let port = config.port;
    let state = AppState::new(store, catalog, config);
    let app = certrack_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("certrack API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
