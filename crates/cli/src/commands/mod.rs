//! Subcommand implementations.

pub mod migrate;
pub mod oversell;
pub mod staff;

use liveshop_admin::config::{ConfigError, database_url_from_env};
use sqlx::PgPool;

/// Connect to the back-office database named by `LIVESHOP_DATABASE_URL`
/// (or `DATABASE_URL`).
pub async fn connect() -> Result<PgPool, ConnectError> {
    let url = database_url_from_env()?;
    tracing::info!("Connecting to database...");
    Ok(liveshop_admin::db::create_pool(&url).await?)
}

/// Failure to reach the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}
