#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::Json,
    http::{header, Request, Response, StatusCode},
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, Session};
use uuid::Uuid;

use artzy_storefront::config::AppConfig;
use artzy_storefront::db::categories::CategoryDeletion;
use artzy_storefront::db::products::NewProduct;
use artzy_storefront::db::users::NewUser;
use artzy_storefront::db::{CategoryRepository, ProductRepository, UserRepository, MIGRATOR};
use artzy_storefront::domain::aggregates::{Category, Product, Role, User};
use artzy_storefront::domain::value_objects::Money;
use artzy_storefront::middleware::{create_session_layer, set_current_user, CurrentUser};
use artzy_storefront::routes;
use artzy_storefront::services::payments::{PaymentError, PaymentGateway, PaymentIntent, PaymentIntentRequest};
use artzy_storefront::state::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/artzy_test".to_string()),
        "PAYMENT_SECRET_KEY" => Some("sk_test_key".to_string()),
        "PAYMENT_WEBHOOK_SECRET" => Some(WEBHOOK_SECRET.to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn webhook_secret() -> SecretString {
    SecretString::from(WEBHOOK_SECRET)
}

/// Gateway that answers locally; `failing` makes every call error.
#[derive(Default)]
pub struct FakeGateway {
    pub failing: bool,
    pub calls: AtomicUsize,
}

impl FakeGateway {
    pub fn failing() -> Self {
        Self { failing: true, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(PaymentError::Api { status: 503, message: "unavailable".to_string() });
        }
        let id = format!("pi_{}", request.order_id.simple());
        Ok(PaymentIntent { client_secret: format!("{id}_secret"), id })
    }
}

/// Pool that never connects until a query runs.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new().connect_lazy("postgres://localhost/artzy_unused").unwrap()
}

/// Pool on `TEST_DATABASE_URL` with migrations applied, or `None` to skip.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new().max_connections(10).connect(&url).await.unwrap();
    MIGRATOR.run(&pool).await.unwrap();
    Some(pool)
}

async fn test_login(session: Session, Json(user): Json<CurrentUser>) -> StatusCode {
    set_current_user(&session, &user).await.unwrap();
    StatusCode::NO_CONTENT
}

/// The API plus `POST /test/login`, which puts any identity in the session.
pub fn test_app(pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Router {
    let state = AppState::new(test_config(), pool, gateway);
    routes::api_routes()
        .route("/test/login", post(test_login))
        .with_state(state)
        .layer(create_session_layer(MemoryStore::default(), false))
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Signs in through the test route and returns the `Cookie` header value.
pub async fn login(app: &Router, id: Uuid, role: Role) -> String {
    let user = CurrentUser { id, email: format!("{id}@example.tn"), role };
    let response = send(app, json_request("POST", "/test/login", None, &serde_json::to_value(&user).unwrap())).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

// ---- fixtures ----

pub async fn create_user(pool: &PgPool, role: Role) -> User {
    UserRepository::new(pool)
        .create(NewUser {
            email: format!("{}@example.tn", Uuid::new_v4()),
            password_hash: "not-a-real-hash".to_string(),
            first_name: "Amel".to_string(),
            last_name: "Ben Salah".to_string(),
            phone: Some("+21698765432".to_string()),
            role,
        })
        .await
        .unwrap()
}

pub async fn create_category(pool: &PgPool) -> Category {
    CategoryRepository::new(pool).create(&format!("Catégorie {}", Uuid::new_v4())).await.unwrap()
}

pub async fn create_product(pool: &PgPool, category: &Category, price: i64, stock: i32) -> Product {
    ProductRepository::new(pool)
        .create(NewProduct {
            name: format!("Bougie {}", Uuid::new_v4()),
            description: "Bougie parfumée".to_string(),
            price: Money::new(Decimal::from(price)),
            original_price: None,
            category_id: category.id,
            is_customizable: false,
            customization_options: None,
            images: vec![],
            stock,
        })
        .await
        .unwrap()
}

pub async fn delete_category(pool: &PgPool, category: &Category) -> CategoryDeletion {
    CategoryRepository::new(pool).delete(category.id).await.unwrap()
}
