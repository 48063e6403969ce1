//! Back-office endpoints. Every handler takes [`RequireAdmin`].

use std::str::FromStr;

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::catalog::PRODUCT_NOT_FOUND;
use super::{ApiJson, ApiPath};
use crate::db::categories::CategoryDeletion;
use crate::db::products::{NewProduct, ProductChanges, ProductWithCategory};
use crate::db::stats::DashboardStats;
use crate::db::{CategoryRepository, OrderRepository, ProductRepository, RepositoryError, StatsRepository, UserRepository};
use crate::domain::aggregates::category::normalize_name;
use crate::domain::aggregates::{
    Category, CategoryWithCount, CustomizationOptions, Order, OrderDetail, OrderStatus, OrderSummary, Product, Profile,
};
use crate::domain::value_objects::Money;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

const NAME_REQUIRED: &str = "Le nom est requis";
const CATEGORY_EXISTS: &str = "Cette catégorie existe déjà";
const CATEGORY_NOT_FOUND: &str = "Catégorie non trouvée";
const ORDER_NOT_FOUND: &str = "Commande non trouvée";

// ---- categories ----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryRequest {
    pub name: Option<String>,
}

pub async fn list_categories(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryWithCount>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list_with_counts(false).await?))
}

#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_category(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let name = normalize_name(request.name.as_deref()).ok_or_else(|| AppError::Validation(NAME_REQUIRED.to_string()))?;
    let category = CategoryRepository::new(state.pool()).create(&name).await.map_err(category_conflict)?;
    info!(category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn update_category(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CategoryRequest>,
) -> Result<Json<Category>> {
    let name = normalize_name(request.name.as_deref()).ok_or_else(|| AppError::Validation(NAME_REQUIRED.to_string()))?;
    CategoryRepository::new(state.pool())
        .rename(id, &name)
        .await
        .map_err(category_conflict)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(CATEGORY_NOT_FOUND.to_string()))
}

#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn delete_category(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>> {
    match CategoryRepository::new(state.pool()).delete(id).await? {
        CategoryDeletion::Deleted => Ok(Json(json!({ "success": true }))),
        CategoryDeletion::NotFound => Err(AppError::NotFound(CATEGORY_NOT_FOUND.to_string())),
        CategoryDeletion::InUse(count) => {
            info!(products = count, "Category still in use");
            Err(AppError::Validation("Impossible de supprimer une catégorie qui contient des produits".to_string()))
        }
    }
}

fn category_conflict(err: RepositoryError) -> AppError {
    if err.is_unique_violation() { AppError::Validation(CATEGORY_EXISTS.to_string()) } else { err.into() }
}

// ---- products ----

/// A number or a numeric string, as back-office forms send either.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(serde_json::Number),
    Text(String),
}

impl Numeric {
    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }

    fn decimal(&self) -> Option<Decimal> {
        let raw = match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        };
        Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)).ok()
    }

    fn integer(&self) -> Option<i32> {
        match self {
            Self::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Distinguishes an explicit `null` from an absent field.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn price(field: &str, value: &Numeric) -> Result<Money> {
    value
        .decimal()
        .map(Money::new)
        .filter(|m| !m.is_negative())
        .ok_or_else(|| AppError::Validation(format!("{field} invalide")))
}

fn optional_price(field: &str, value: Option<&Numeric>) -> Result<Option<Money>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_blank() => Ok(None),
        Some(v) => price(field, v).map(Some),
    }
}

fn stock(value: &Numeric) -> Result<i32> {
    match value.integer() {
        Some(n) if n >= 0 => Ok(n),
        Some(_) => Err(AppError::Validation("Le stock ne peut pas être négatif".to_string())),
        None => Err(AppError::Validation("Stock invalide".to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Numeric>,
    pub original_price: Option<Numeric>,
    pub category_id: Option<Uuid>,
    pub is_customizable: Option<bool>,
    pub customization_options: Option<CustomizationOptions>,
    pub images: Option<Vec<String>>,
    pub stock: Option<Numeric>,
}

impl CreateProductRequest {
    fn into_new_product(self) -> Result<NewProduct> {
        let name = normalize_name(self.name.as_deref()).ok_or_else(|| AppError::Validation(NAME_REQUIRED.to_string()))?;
        let price = price("price", self.price.as_ref().ok_or_else(|| AppError::Validation("Le prix est requis".to_string()))?)?;
        let category_id = self.category_id.ok_or_else(|| AppError::Validation("La catégorie est requise".to_string()))?;
        let stock = match self.stock.as_ref().filter(|s| !s.is_blank()) {
            Some(v) => stock(v)?,
            None => 0,
        };
        Ok(NewProduct {
            name,
            description: self.description.unwrap_or_default(),
            price,
            original_price: optional_price("originalPrice", self.original_price.as_ref())?,
            category_id,
            is_customizable: self.is_customizable.unwrap_or(false),
            customization_options: self.customization_options,
            images: self.images.unwrap_or_default(),
            stock,
        })
    }
}

/// Every field optional. `originalPrice` and `customizationOptions` may be
/// `null` to clear them.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Numeric>,
    #[serde(deserialize_with = "nullable")]
    pub original_price: Option<Option<Numeric>>,
    pub category_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub is_customizable: Option<bool>,
    #[serde(deserialize_with = "nullable")]
    pub customization_options: Option<Option<CustomizationOptions>>,
    pub images: Option<Vec<String>>,
    pub stock: Option<Numeric>,
}

impl UpdateProductRequest {
    fn into_changes(self) -> Result<ProductChanges> {
        let name = match self.name {
            Some(raw) => Some(normalize_name(Some(&raw)).ok_or_else(|| AppError::Validation(NAME_REQUIRED.to_string()))?),
            None => None,
        };
        Ok(ProductChanges {
            name,
            description: self.description,
            price: self.price.as_ref().map(|v| price("price", v)).transpose()?,
            original_price: match self.original_price {
                None => None,
                Some(value) => Some(optional_price("originalPrice", value.as_ref())?),
            },
            category_id: self.category_id,
            is_active: self.is_active,
            is_customizable: self.is_customizable,
            customization_options: self.customization_options,
            images: self.images,
            stock: self.stock.as_ref().map(stock).transpose()?,
        })
    }
}

pub async fn list_products(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductWithCategory>>> {
    Ok(Json(ProductRepository::new(state.pool()).list_with_category().await?))
}

pub async fn get_product(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .find(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(PRODUCT_NOT_FOUND.to_string()))
}

#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let new = request.into_new_product()?;
    let product = ProductRepository::new(state.pool()).create(new).await.map_err(unknown_category)?;
    info!(product_id = %product.id, price = %product.price, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> Result<Json<Product>> {
    let changes = request.into_changes()?;
    ProductRepository::new(state.pool())
        .update(id, changes)
        .await
        .map_err(unknown_category)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(PRODUCT_NOT_FOUND.to_string()))
}

fn unknown_category(err: RepositoryError) -> AppError {
    if err.is_foreign_key_violation() { AppError::Validation(CATEGORY_NOT_FOUND.to_string()) } else { err.into() }
}

// ---- orders ----

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    /// `null` or `""` clears the tracking number.
    #[serde(deserialize_with = "nullable")]
    pub tracking_number: Option<Option<String>>,
}

pub async fn list_orders(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderSummary>>> {
    Ok(Json(OrderRepository::new(state.pool()).list_all().await?))
}

pub async fn get_order(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<OrderDetail>> {
    OrderRepository::new(state.pool())
        .find_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(ORDER_NOT_FOUND.to_string()))
}

/// Any status may be set; leaving the usual lifecycle is only logged.
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn update_order(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateOrderRequest>,
) -> Result<Json<Order>> {
    let status = request.status.ok_or_else(|| AppError::Validation("Le statut est requis".to_string()))?;
    let tracking_number = request
        .tracking_number
        .map(|t| t.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()));

    let change = OrderRepository::new(state.pool())
        .update_status(id, status, tracking_number)
        .await?
        .ok_or_else(|| AppError::NotFound(ORDER_NOT_FOUND.to_string()))?;
    if !change.previous_status.can_transition_to(status) {
        warn!(from = ?change.previous_status, to = ?status, "Order status set outside the usual lifecycle");
    }
    Ok(Json(change.order))
}

// ---- dashboard ----

pub async fn stats(RequireAdmin(_admin): RequireAdmin, State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    Ok(Json(StatsRepository::new(state.pool()).dashboard().await?))
}

pub async fn list_users(RequireAdmin(_admin): RequireAdmin, State(state): State<AppState>) -> Result<Json<Vec<Profile>>> {
    Ok(Json(UserRepository::new(state.pool()).list().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(body: Value) -> Result<NewProduct> {
        serde_json::from_value::<CreateProductRequest>(body).unwrap().into_new_product()
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let new = create(json!({
            "name": "Bougie", "price": "24.5", "originalPrice": 30, "stock": "7",
            "categoryId": Uuid::nil(),
        }))
        .unwrap();
        assert_eq!(new.price, Money::new(Decimal::new(245, 1)));
        assert_eq!(new.original_price, Some(Money::dinars(30)));
        assert_eq!(new.stock, 7);
        assert!(!new.is_customizable);
        assert!(new.images.is_empty());
    }

    #[test]
    fn test_create_requires_name_price_and_category() {
        let err = create(json!({ "price": 10, "categoryId": Uuid::nil() })).unwrap_err();
        assert_eq!(err.public_message(), NAME_REQUIRED);
        let err = create(json!({ "name": "Bougie", "categoryId": Uuid::nil() })).unwrap_err();
        assert_eq!(err.public_message(), "Le prix est requis");
        let err = create(json!({ "name": "Bougie", "price": 10 })).unwrap_err();
        assert_eq!(err.public_message(), "La catégorie est requise");
    }

    #[test]
    fn test_negative_stock_is_rejected() {
        let err = create(json!({ "name": "Bougie", "price": 10, "stock": -1, "categoryId": Uuid::nil() })).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let request: UpdateProductRequest = serde_json::from_value(json!({ "stock": "-3" })).unwrap();
        assert!(request.into_changes().is_err());
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let request: UpdateProductRequest = serde_json::from_value(json!({ "originalPrice": null })).unwrap();
        let changes = request.into_changes().unwrap();
        assert_eq!(changes.original_price, Some(None));
        assert_eq!(changes.customization_options, None);

        let request: UpdateProductRequest = serde_json::from_value(json!({ "isActive": false })).unwrap();
        let changes = request.into_changes().unwrap();
        assert_eq!(changes.original_price, None);
        assert_eq!(changes.is_active, Some(false));
    }

    #[test]
    fn test_order_patch_tracking_number() {
        let request: UpdateOrderRequest = serde_json::from_value(json!({ "status": "SHIPPED", "trackingNumber": "" })).unwrap();
        assert_eq!(request.status, Some(OrderStatus::Shipped));
        assert_eq!(request.tracking_number, Some(Some(String::new())));

        let request: UpdateOrderRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.status, None);
        assert_eq!(request.tracking_number, None);
    }
}
