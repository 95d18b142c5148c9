//! Persistence layer: Postgres pool, migrations, models and repositories.
//!
//! Handlers talk to the [`AccountStore`] and [`RegistryStore`] traits.
//! [`PgStore`] implements both on top of the zero-sized repositories; the
//! `memory` feature adds an in-process implementation for tests.

use sqlx::postgres::PgPoolOptions;

pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::StoreError;
pub use store::{AccountStore, PgStore, RegistryStore};

pub type DbPool = sqlx::PgPool;

const MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    tracing::debug!(max_connections = MAX_CONNECTIONS, "Connecting to Postgres");
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = sqlx::migrate!("../../db/migrations");
    tracing::debug!(available = migrator.iter().count(), "Running migrations");
    migrator.run(pool).await
}
