use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cnh_registry::api::{self, middleware::state::AppState};
use cnh_registry::config::Config;
use cnh_registry::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cnh_registry=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CNH registry server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Open the record store (Postgres when configured)
    let store = db::open_store(config.database_url.as_deref()).await?;

    let state = AppState::new(config.clone(), store)?;

    if config.seed_demo_data {
        let seeded = db::seed::seed_demo_data(state.store.as_ref(), state.hasher.as_ref()).await?;
        tracing::info!(seeded, "Demo data check completed");
    }

    let app = api::app(state);

    // Start server
    let listener = api::bind(&config.host, config.port).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}
