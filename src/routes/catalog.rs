//! Public catalog: products and categories.

use std::str::FromStr;

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiPath, ApiQuery};
use crate::db::products::{CatalogFilter, CatalogSort};
use crate::db::{CategoryRepository, FavoriteRepository, ProductRepository};
use crate::domain::aggregates::{CategoryWithCount, Product, ProductDetail};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::state::AppState;

pub(crate) const PRODUCT_NOT_FOUND: &str = "Produit non trouvé";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub category_id: Option<Uuid>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub search: Option<String>,
    pub sort: Option<CatalogSort>,
}

impl CatalogQuery {
    /// Empty parameters are ignored; anything else must be a number.
    fn into_filter(self) -> Result<CatalogFilter> {
        Ok(CatalogFilter {
            category_id: self.category_id,
            min_price: parse_price("minPrice", self.min_price.as_deref())?,
            max_price: parse_price("maxPrice", self.max_price.as_deref())?,
            search: self.search,
            sort: self.sort.unwrap_or_default(),
        })
    }
}

fn parse_price(name: &str, raw: Option<&str>) -> Result<Option<Decimal>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => Decimal::from_str(v)
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{name} invalide"))),
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CatalogQuery>,
) -> Result<Json<Vec<Product>>> {
    let filter = query.into_filter()?;
    Ok(Json(ProductRepository::new(state.pool()).list_catalog(&filter).await?))
}

/// Active product, flagged when it is in the caller's favorites.
pub async fn get_product(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ProductDetail>> {
    let product = ProductRepository::new(state.pool())
        .find(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(PRODUCT_NOT_FOUND.to_string()))?;

    let is_favorite = match user {
        Some(user) => FavoriteRepository::new(state.pool()).exists(user.id, product.id).await?,
        None => false,
    };
    Ok(Json(ProductDetail { product, is_favorite }))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryWithCount>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list_with_counts(true).await?))
}
