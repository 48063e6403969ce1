//! Database access for the storefront `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `users`, `addresses`, `favorites` - account data
//! - `categories`, `products` - catalog
//! - `orders`, `order_items` - purchases
//!
//! The schema lives in `migrations/` and is applied at startup (see
//! `RUN_MIGRATIONS`). Sessions are stored by `tower-sessions-sqlx-store` in
//! its own `tower_sessions` schema.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

pub mod addresses;
pub mod categories;
pub mod favorites;
pub mod orders;
pub mod products;
pub mod stats;
pub mod users;

pub use addresses::AddressRepository;
pub use categories::CategoryRepository;
pub use favorites::FavoriteRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use stats::StatsRepository;
pub use users::UserRepository;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Postgres `23505`.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::Database(e)) if e.is_unique_violation())
    }

    /// Postgres `23503`.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::Database(e)) if e.is_foreign_key_violation())
    }
}

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
