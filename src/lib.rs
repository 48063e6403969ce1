//! Artzy storefront
//!
//! Storefront and back-office API for a Tunisian gift shop.
//!
//! ## Features
//! - Catalog browsing with filters
//! - Customer accounts, address book and favorites
//! - Transactional checkout with payment intents and signed webhooks
//! - Back-office for products, categories, orders and users

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use state::AppState;
