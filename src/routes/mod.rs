//! HTTP routes.
//!
//! | Prefix | Module | Access |
//! |---|---|---|
//! | `/auth` | [`auth`] | public |
//! | `/products`, `/categories` | [`catalog`] | public |
//! | `/profile`, `/addresses`, `/favorites`, `/orders` | [`account`] | signed in |
//! | `/checkout` | [`checkout`] | signed in |
//! | `/webhooks` | [`webhooks`] | signed by the processor |
//! | `/admin` | [`admin`] | admins |

use axum::{
    extract::{FromRequest, FromRequestParts},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::error::AppError;
use crate::state::AppState;

pub mod account;
pub mod admin;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod webhooks;

/// JSON body whose rejection is answered with `{ "error": ... }`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Every route, without layers or state.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::get_product))
        .route("/categories", get(catalog::list_categories))
        .route("/profile", get(account::get_profile).put(account::update_profile))
        .route("/addresses", get(account::list_addresses).post(account::create_address))
        .route("/addresses/{id}", put(account::update_address).delete(account::delete_address))
        .route(
            "/favorites",
            get(account::list_favorites).post(account::add_favorite).delete(account::remove_favorite),
        )
        .route("/orders", get(account::list_orders))
        .route("/checkout/create", post(checkout::create))
        .route("/checkout/{order_id}/payment-intent", post(checkout::retry_payment_intent))
        .route("/webhooks/payment", post(webhooks::payment))
        .route("/admin/categories", get(admin::list_categories).post(admin::create_category))
        .route("/admin/categories/{id}", put(admin::update_category).delete(admin::delete_category))
        .route("/admin/products", get(admin::list_products).post(admin::create_product))
        .route("/admin/products/{id}", get(admin::get_product).patch(admin::update_product))
        .route("/admin/orders", get(admin::list_orders))
        .route("/admin/orders/{id}", get(admin::get_order).patch(admin::update_order))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
}

/// The served application: routes, sessions, CORS and request tracing.
pub fn app<S>(state: AppState, sessions: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    api_routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(sessions),
    )
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "artzy-storefront"}))
}
