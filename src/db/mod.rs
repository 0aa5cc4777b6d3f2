use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;

pub mod memory;
pub mod seed;
pub mod store;

pub use memory::MemoryStore;
pub use store::{CnhStore, PgStore, StoreError, StoreResult};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Connects and migrates Postgres when a URL is configured, otherwise falls
/// back to the in-memory store.
pub async fn open_store(database_url: Option<&str>) -> Result<Arc<dyn CnhStore>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!("DATABASE_URL not set, using in-memory store. Data will not survive restarts.");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = create_pool(url).await?;
    tracing::info!("Database pool created");

    run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    Ok(Arc::new(PgStore::new(pool)))
}
