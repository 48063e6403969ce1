//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::payments::PaymentGateway;

/// Cheaply cloneable handle on the pool, the payment gateway and the config.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn new(config: AppConfig, pool: PgPool, payments: Arc<dyn PaymentGateway>) -> Self {
        Self { inner: Arc::new(AppStateInner { config, pool, payments }) }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.payments.as_ref()
    }
}
