//! Artzy storefront API server.

use std::sync::Arc;

use anyhow::{Context, Result};
use artzy_storefront::{
    config::AppConfig,
    db::{create_pool, MIGRATOR},
    middleware::create_session_layer,
    routes,
    services::payments::StripeGateway,
    state::AppState,
};
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("connecting to the database")?;
    if config.run_migrations {
        MIGRATOR.run(&pool).await.context("applying migrations")?;
    }

    let session_store = PostgresStore::new(pool.clone());
    session_store.migrate().await.context("creating the session table")?;
    let sessions = create_session_layer(session_store, config.secure_cookies);

    let payments = Arc::new(StripeGateway::new(&config.payment).context("building the payment client")?);
    let addr = config.socket_addr();
    let app = routes::app(AppState::new(config, pool, payments), sessions);

    tracing::info!("Artzy storefront listening on {addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
