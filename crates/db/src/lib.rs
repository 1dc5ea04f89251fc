//! Persistence layer: connection pool, entity models, and repositories.

pub mod error;
pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

pub use error::{LedgerError, QueueError};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
///
/// The pool is owned by the composing application and passed down to
/// every repository call; nothing in this crate holds global state.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Close the pool, waiting for in-flight connections to finish.
pub async fn close_pool(pool: &DbPool) {
    pool.close().await;
}
