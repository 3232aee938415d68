//! Database operations for the back-office `PostgreSQL`.
//!
//! # Schema: `liveshop`
//!
//! ## Tables
//!
//! - `staff_user` - Back-office accounts (argon2 password hashes)
//! - `customer` - Buyers, keyed by Facebook commenter ID when known
//! - `live_session` / `live_phase` - Live-selling sessions and their half-day phases
//! - `live_product` - Products shown during a phase, with prepared/sold counts
//! - `live_order` - Orders claimed during a phase, with oversell and TPOS sync state
//! - `purchase_order` / `purchase_order_item` - Supplier orders
//! - `goods_receiving` / `goods_receiving_item` - Deliveries against supplier orders
//! - `session` - tower-sessions store
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p liveshop-cli -- migrate
//! ```

pub mod customers;
pub mod goods_receiving;
pub mod live_orders;
pub mod live_products;
pub mod live_sessions;
pub mod purchase_orders;
pub mod staff_users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use customers::CustomerRepository;
pub use goods_receiving::GoodsReceivingRepository;
pub use live_orders::LiveOrderRepository;
pub use live_products::LiveProductRepository;
pub use live_sessions::LiveSessionRepository;
pub use purchase_orders::PurchaseOrderRepository;
pub use staff_users::StaffUserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate session index).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to `Conflict` with `message`.
    pub(crate) fn conflict_or(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Parse a text column into a domain enum, reporting bad values as corruption.
pub(crate) fn parse_column<T>(value: &str, column: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| {
        RepositoryError::DataCorruption(format!("invalid {column} in database: {e}"))
    })
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
