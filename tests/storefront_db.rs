//! Database-backed tests. They run only when `TEST_DATABASE_URL` points at a
//! disposable `PostgreSQL` database and return early otherwise.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use artzy_storefront::db::categories::CategoryDeletion;
use artzy_storefront::db::orders::PaymentConfirmation;
use artzy_storefront::db::products::ProductChanges;
use artzy_storefront::db::{
    AddressRepository, FavoriteRepository, OrderRepository, ProductRepository, StatsRepository, UserRepository,
};
use artzy_storefront::domain::aggregates::{AddressInput, AddressUpdate, Order, OrderStatus, Product, Role, User};
use artzy_storefront::domain::value_objects::Money;
use artzy_storefront::services::auth::{verify_password, AuthError, AuthService, ProfileUpdate};
use artzy_storefront::services::checkout::{CheckoutError, CheckoutRequest, CheckoutService};
use artzy_storefront::services::payments::{signature_header, SIGNATURE_HEADER};
use common::{
    create_category, create_product, create_user, delete_category, json_body, json_request, login, send, test_app,
    test_pool, webhook_secret, FakeGateway,
};

fn shipping_address() -> Value {
    json!({
        "firstName": "Amel", "lastName": "Ben Salah", "phone": "98765432",
        "governorate": "Tunis", "city": "Tunis", "street": "Rue de Marseille"
    })
}

fn line(product: &Product, quantity: u32) -> Value {
    json!({ "productId": product.id, "quantity": quantity, "price": product.price })
}

fn address_input(is_default: bool) -> AddressInput {
    AddressInput {
        label: Some("Maison".into()),
        first_name: "Amel".into(),
        last_name: "Ben Salah".into(),
        phone: "98765432".into(),
        governorate: "Sfax".into(),
        city: "Sfax".into(),
        street: "Route de Tunis".into(),
        is_default,
        ..Default::default()
    }
}

async fn place_order(pool: &sqlx::PgPool, user: &User, product: &Product, quantity: u32) -> Order {
    let request: CheckoutRequest = serde_json::from_value(json!({
        "items": [line(product, quantity)],
        "shippingAddress": shipping_address(),
        "giftWrap": false
    }))
    .unwrap();
    let gateway = FakeGateway::default();
    CheckoutService::new(pool, &gateway).place_order(user.id, &request).await.unwrap()
}

async fn stock_of(pool: &sqlx::PgPool, product: &Product) -> i32 {
    ProductRepository::new(pool).find(product.id).await.unwrap().unwrap().stock
}

#[tokio::test]
async fn test_checkout_totals_and_stock() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, &category, 10, 5).await;
    let app = test_app(pool.clone(), Arc::new(FakeGateway::default()));
    let cookie = login(&app, user.id, Role::Customer).await;

    let body = json!({
        "items": [line(&product, 2)],
        "shippingAddress": shipping_address(),
        "giftWrap": true,
        "shippingCost": 5
    });
    let response = send(&app, json_request("POST", "/checkout/create", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let order_id: Uuid = body["orderId"].as_str().unwrap().parse().unwrap();
    assert!(body["clientSecret"].as_str().unwrap().ends_with("_secret"));

    let order = OrderRepository::new(&pool).find_for_user(order_id, user.id).await.unwrap().unwrap();
    assert_eq!(order.subtotal, Money::dinars(20));
    assert_eq!(order.shipping_cost, Money::dinars(5));
    assert_eq!(order.gift_wrap_cost, Money::dinars(5));
    assert_eq!(order.total, Money::dinars(30));
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.payment_intent_id.is_some());
    assert_eq!(stock_of(&pool, &product).await, 3);

    let addresses = AddressRepository::new(&pool).list(user.id).await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].label.as_deref(), Some("Livraison"));
    assert!(!addresses[0].is_default);
}

#[tokio::test]
async fn test_checkout_is_all_or_nothing() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let category = create_category(&pool).await;
    let plenty = create_product(&pool, &category, 10, 5).await;
    let scarce = create_product(&pool, &category, 15, 1).await;
    let app = test_app(pool.clone(), Arc::new(FakeGateway::default()));
    let cookie = login(&app, user.id, Role::Customer).await;

    let body = json!({
        "items": [line(&plenty, 2), line(&scarce, 2)],
        "shippingAddress": shipping_address(),
        "giftWrap": false
    });
    let response = send(&app, json_request("POST", "/checkout/create", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(error.starts_with("Stock insuffisant pour"));
    assert!(error.ends_with("(Disponible: 1)"));

    assert_eq!(stock_of(&pool, &plenty).await, 5);
    assert_eq!(stock_of(&pool, &scarce).await, 1);
    assert!(OrderRepository::new(&pool).list_for_user(user.id).await.unwrap().is_empty());
    assert!(AddressRepository::new(&pool).list(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_checkouts_for_the_last_unit() {
    let Some(pool) = test_pool().await else { return };
    let category = create_category(&pool).await;
    let product = create_product(&pool, &category, 12, 1).await;
    let first = create_user(&pool, Role::Customer).await;
    let second = create_user(&pool, Role::Customer).await;
    let gateway = FakeGateway::default();

    let request: CheckoutRequest = serde_json::from_value(json!({
        "items": [line(&product, 1)],
        "shippingAddress": shipping_address(),
        "giftWrap": false
    }))
    .unwrap();

    let service = CheckoutService::new(&pool, &gateway);
    let (a, b) = tokio::join!(service.place_order(first.id, &request), service.place_order(second.id, &request));

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(CheckoutError::StockInsufficient { available: 0 | 1, .. }))));
    assert_eq!(stock_of(&pool, &product).await, 0);
}

#[tokio::test]
async fn test_payment_failure_keeps_a_retryable_order() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, &category, 40, 3).await;

    let broken = test_app(pool.clone(), Arc::new(FakeGateway::failing()));
    let cookie = login(&broken, user.id, Role::Customer).await;
    let body = json!({ "items": [line(&product, 1)], "shippingAddress": shipping_address(), "giftWrap": false });
    let response = send(&broken, json_request("POST", "/checkout/create", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    let order_id: Uuid = body["orderId"].as_str().unwrap().parse().unwrap();

    let order = OrderRepository::new(&pool).find_for_user(order_id, user.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.payment_intent_id.is_none());
    assert_eq!(stock_of(&pool, &product).await, 2);

    let working = test_app(pool.clone(), Arc::new(FakeGateway::default()));
    let cookie = login(&working, user.id, Role::Customer).await;
    let uri = format!("/checkout/{order_id}/payment-intent");
    let response = send(&working, json_request("POST", &uri, Some(&cookie), &json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&working, json_request("POST", &uri, Some(&cookie), &json!({}))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let stranger = login(&working, Uuid::new_v4(), Role::Customer).await;
    let response = send(&working, json_request("POST", &uri, Some(&stranger), &json!({}))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_confirms_order_idempotently() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, &category, 25, 2).await;
    let app = test_app(pool.clone(), Arc::new(FakeGateway::default()));
    let cookie = login(&app, user.id, Role::Customer).await;

    let body = json!({ "items": [line(&product, 1)], "shippingAddress": shipping_address(), "giftWrap": false });
    let response = send(&app, json_request("POST", "/checkout/create", Some(&cookie), &body)).await;
    let order_id: Uuid = json_body(response).await["orderId"].as_str().unwrap().parse().unwrap();
    let order = OrderRepository::new(&pool).find_for_user(order_id, user.id).await.unwrap().unwrap();
    let intent_id = order.payment_intent_id.unwrap();

    let event = json!({ "type": "payment_intent.succeeded", "data": { "object": { "id": intent_id } } }).to_string();
    for _ in 0..2 {
        let signature = signature_header(event.as_bytes(), &webhook_secret(), chrono::Utc::now().timestamp()).unwrap();
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/webhooks/payment")
            .header(SIGNATURE_HEADER, signature)
            .body(axum::body::Body::from(event.clone()))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["received"], true);
    }

    let order = OrderRepository::new(&pool).find_for_user(order_id, user.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_single_default_address() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let addresses = AddressRepository::new(&pool);

    let first = addresses.create(user.id, &address_input(true)).await.unwrap();
    let second = addresses.create(user.id, &address_input(true)).await.unwrap();
    let defaults: Vec<Uuid> =
        addresses.list(user.id).await.unwrap().into_iter().filter(|a| a.is_default).map(|a| a.id).collect();
    assert_eq!(defaults, vec![second.id]);

    let update = AddressUpdate { is_default: Some(true), ..Default::default() };
    addresses.update(first.id, user.id, update).await.unwrap().unwrap();
    let defaults: Vec<Uuid> =
        addresses.list(user.id).await.unwrap().into_iter().filter(|a| a.is_default).map(|a| a.id).collect();
    assert_eq!(defaults, vec![first.id]);

    let other = create_user(&pool, Role::Customer).await;
    let foreign = AddressUpdate { city: Some("Gabès".into()), ..Default::default() };
    assert!(addresses.update(first.id, other.id, foreign).await.unwrap().is_none());
    assert!(!addresses.delete(first.id, other.id).await.unwrap());
}

#[tokio::test]
async fn test_category_delete_guard() {
    let Some(pool) = test_pool().await else { return };
    let category = create_category(&pool).await;
    let product = create_product(&pool, &category, 8, 1).await;

    assert_eq!(delete_category(&pool, &category).await, CategoryDeletion::InUse(1));

    let elsewhere = create_category(&pool).await;
    let changes = ProductChanges { category_id: Some(elsewhere.id), ..Default::default() };
    ProductRepository::new(&pool).update(product.id, changes).await.unwrap().unwrap();

    assert_eq!(delete_category(&pool, &category).await, CategoryDeletion::Deleted);
    assert_eq!(delete_category(&pool, &category).await, CategoryDeletion::NotFound);
}

#[tokio::test]
async fn test_favorites_are_idempotent() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, &category, 8, 1).await;
    let favorites = FavoriteRepository::new(&pool);

    let first = favorites.add(user.id, product.id).await.unwrap();
    let second = favorites.add(user.id, product.id).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(favorites.list(user.id).await.unwrap().len(), 1);

    favorites.remove(user.id, product.id).await.unwrap();
    favorites.remove(user.id, product.id).await.unwrap();
    assert!(!favorites.exists(user.id, product.id).await.unwrap());

    let (a, b) = tokio::join!(favorites.add(user.id, product.id), favorites.add(user.id, product.id));
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(favorites.list(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_catalog_hides_inactive_products() {
    let Some(pool) = test_pool().await else { return };
    let category = create_category(&pool).await;
    let product = create_product(&pool, &category, 18, 4).await;
    let app = test_app(pool.clone(), Arc::new(FakeGateway::default()));

    let uri = format!("/products/{}", product.id);
    let response = send(&app, common::get(&uri, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["isFavorite"], false);

    let changes = ProductChanges { is_active: Some(false), price: Some(Money::new(Decimal::new(19_500, 3))), ..Default::default() };
    ProductRepository::new(&pool).update(product.id, changes).await.unwrap().unwrap();

    let response = send(&app, common::get(&uri, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "Produit non trouvé");

    let response = send(&app, common::get(&format!("/products?categoryId={}", category.id), None)).await;
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn test_duplicate_category_names() {
    let Some(pool) = test_pool().await else { return };
    let app = test_app(pool.clone(), Arc::new(FakeGateway::default()));
    let cookie = login(&app, Uuid::new_v4(), Role::Admin).await;
    let name = format!("Bijoux {}", Uuid::new_v4());

    let response = send(&app, json_request("POST", "/admin/categories", Some(&cookie), &json!({ "name": name }))).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, json_request("POST", "/admin/categories", Some(&cookie), &json!({ "name": name }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Cette catégorie existe déjà");

    let other = create_category(&pool).await;
    let uri = format!("/admin/categories/{}", other.id);
    let response = send(&app, json_request("PUT", &uri, Some(&cookie), &json!({ "name": name }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Cette catégorie existe déjà");
}

#[tokio::test]
async fn test_dashboard_revenue_and_rankings() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let category = create_category(&pool).await;
    let stats = StatsRepository::new(&pool);

    let best_seller = create_product(&pool, &category, 3, 100).await;
    for _ in 0..12 {
        place_order(&pool, &user, &best_seller, 1).await;
    }
    for price in [4, 5, 6, 7, 8] {
        create_product(&pool, &category, price, 1).await;
    }

    let dashboard = stats.dashboard().await.unwrap();
    assert!(dashboard.total_orders >= 12);
    assert_eq!(dashboard.recent_orders.len(), 10);
    assert_eq!(dashboard.popular_products.len(), 5);
    assert_eq!(dashboard.popular_products[0].product.id, best_seller.id);
    assert_eq!(dashboard.popular_products[0].order_item_count, 12);

    let expensive = create_product(&pool, &category, 1_000_000, 1).await;
    let order = place_order(&pool, &user, &expensive, 1).await;
    let before = stats.dashboard().await.unwrap().total_revenue.amount();
    OrderRepository::new(&pool).update_status(order.id, OrderStatus::Cancelled, None).await.unwrap().unwrap();
    let after = stats.dashboard().await.unwrap().total_revenue.amount();

    // Other tests may place or cancel small orders meanwhile.
    let dropped = before - after;
    let slack = Decimal::from(10_000);
    assert!(dropped > order.total.amount() - slack, "revenue dropped by {dropped}");
    assert!(dropped < order.total.amount() + slack, "revenue dropped by {dropped}");
}

#[tokio::test]
async fn test_admin_order_status_and_tracking_number() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, &category, 20, 5).await;
    let order = place_order(&pool, &user, &product, 1).await;
    let app = test_app(pool.clone(), Arc::new(FakeGateway::default()));
    let cookie = login(&app, Uuid::new_v4(), Role::Admin).await;
    let uri = format!("/admin/orders/{}", order.id);

    let patch = |body: Value| json_request("PATCH", &uri, Some(&cookie), &body);

    let response = send(&app, patch(json!({ "status": "SHIPPED", "trackingNumber": " TN-42 " }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "SHIPPED");
    assert_eq!(body["trackingNumber"], "TN-42");

    // Backwards moves are accepted; an absent tracking number is kept.
    let body = json_body(send(&app, patch(json!({ "status": "PENDING" }))).await).await;
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["trackingNumber"], "TN-42");

    let body = json_body(send(&app, patch(json!({ "status": "DELIVERED", "trackingNumber": "" }))).await).await;
    assert_eq!(body["status"], "DELIVERED");
    assert!(body["trackingNumber"].is_null());

    send(&app, patch(json!({ "status": "DELIVERED", "trackingNumber": "TN-43" }))).await;
    let body = json_body(send(&app, patch(json!({ "status": "CANCELLED", "trackingNumber": null }))).await).await;
    assert_eq!(body["status"], "CANCELLED");
    assert!(body["trackingNumber"].is_null());

    let stored = OrderRepository::new(&pool).find_for_user(order.id, user.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
    assert!(stored.tracking_number.is_none());

    let missing = format!("/admin/orders/{}", Uuid::new_v4());
    let response = send(&app, json_request("PATCH", &missing, Some(&cookie), &json!({ "status": "SHIPPED" }))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_late_payment_event_does_not_reopen_shipped_order() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, &category, 20, 5).await;
    let order = place_order(&pool, &user, &product, 1).await;
    let orders = OrderRepository::new(&pool);
    let intent_id = format!("pi_{}", order.id.simple());
    assert!(orders.set_payment_intent(order.id, &intent_id).await.unwrap());

    orders.update_status(order.id, OrderStatus::Shipped, None).await.unwrap().unwrap();
    let outcome = orders.confirm_by_payment_intent(&intent_id).await.unwrap();
    assert!(matches!(
        outcome,
        PaymentConfirmation::Unchanged { order_id, status: OrderStatus::Shipped } if order_id == order.id
    ));
    assert!(matches!(orders.confirm_by_payment_intent("pi_unknown").await.unwrap(), PaymentConfirmation::NotFound));

    let stored = orders.find_for_user(order.id, user.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn test_profile_email_collision() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let other = create_user(&pool, Role::Customer).await;
    let app = test_app(pool.clone(), Arc::new(FakeGateway::default()));
    let cookie = login(&app, user.id, Role::Customer).await;

    let taken = other.email.to_uppercase();
    let response = send(&app, json_request("PUT", "/profile", Some(&cookie), &json!({ "email": taken }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Cet email est déjà utilisé");

    let response = send(&app, json_request("PUT", "/profile", Some(&cookie), &json!({ "email": user.email }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["email"], user.email);
}

#[tokio::test]
async fn test_password_rehashed_only_when_supplied() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, Role::Customer).await;
    let service = AuthService::new(&pool);
    let users = UserRepository::new(&pool);

    let update = ProfileUpdate { first_name: Some("Lina".into()), password: Some(String::new()), ..Default::default() };
    let profile = service.update_profile(user.id, update).await.unwrap();
    assert_eq!(profile.first_name, "Lina");
    assert_eq!(users.get_by_id(user.id).await.unwrap().unwrap().password_hash, user.password_hash);

    let update = ProfileUpdate { password: Some("court".into()), ..Default::default() };
    assert!(matches!(service.update_profile(user.id, update).await, Err(AuthError::WeakPassword(_))));

    let update = ProfileUpdate { password: Some("nouveau-secret".into()), ..Default::default() };
    service.update_profile(user.id, update).await.unwrap();
    let stored = users.get_by_id(user.id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, user.password_hash);
    assert!(verify_password("nouveau-secret", &stored.password_hash).is_ok());
    assert_eq!(stored.first_name, "Lina");
}
