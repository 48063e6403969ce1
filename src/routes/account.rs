//! Self-service for the signed-in customer: profile, address book,
//! favorites and order history.
//!
//! Every query carries the caller's id in its predicate, so an id belonging
//! to someone else behaves exactly like a missing one (404).

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use super::catalog::PRODUCT_NOT_FOUND;
use super::{ApiJson, ApiPath};
use crate::db::{AddressRepository, FavoriteRepository, OrderRepository};
use crate::domain::aggregates::{Address, AddressInput, AddressUpdate, Favorite, FavoriteWithProduct, OrderDetail, Profile};
use crate::domain::value_objects::{Governorate, GovernorateError, PhoneNumber, INVALID_PHONE};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::auth::{AuthService, ProfileUpdate};
use crate::state::AppState;

const ADDRESS_NOT_FOUND: &str = "Adresse non trouvée";

pub async fn get_profile(RequireAuth(user): RequireAuth, State(state): State<AppState>) -> Result<Json<Profile>> {
    Ok(Json(AuthService::new(state.pool()).profile(user.id).await?))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Profile>> {
    update.validate()?;
    Ok(Json(AuthService::new(state.pool()).update_profile(user.id, update).await?))
}

pub async fn list_addresses(RequireAuth(user): RequireAuth, State(state): State<AppState>) -> Result<Json<Vec<Address>>> {
    Ok(Json(AddressRepository::new(state.pool()).list(user.id).await?))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_address(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    input.validate()?;
    check_governorate(&input.governorate)?;
    if !PhoneNumber::is_valid(&input.phone) {
        return Err(AppError::Validation(INVALID_PHONE.to_string()));
    }
    let address = AddressRepository::new(state.pool()).create(user.id, &input).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn update_address(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<AddressUpdate>,
) -> Result<Json<Address>> {
    let update = update.trimmed();
    update.validate()?;
    if let Some(governorate) = &update.governorate {
        check_governorate(governorate)?;
    }
    if update.phone.as_deref().is_some_and(|p| !PhoneNumber::is_valid(p)) {
        return Err(AppError::Validation(INVALID_PHONE.to_string()));
    }
    AddressRepository::new(state.pool())
        .update(id, user.id, update)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(ADDRESS_NOT_FOUND.to_string()))
}

#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn delete_address(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>> {
    match AddressRepository::new(state.pool()).delete(id, user.id).await {
        Ok(true) => Ok(Json(json!({ "success": true }))),
        Ok(false) => Err(AppError::NotFound(ADDRESS_NOT_FOUND.to_string())),
        Err(e) if e.is_foreign_key_violation() => Err(AppError::Validation(
            "Cette adresse est utilisée par une commande".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

fn check_governorate(raw: &str) -> Result<Governorate> {
    raw.parse().map_err(|e: GovernorateError| AppError::Validation(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub product_id: Uuid,
}

pub async fn list_favorites(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<FavoriteWithProduct>>> {
    Ok(Json(FavoriteRepository::new(state.pool()).list(user.id).await?))
}

pub async fn add_favorite(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FavoriteRequest>,
) -> Result<Json<Favorite>> {
    FavoriteRepository::new(state.pool())
        .add(user.id, request.product_id)
        .await
        .map(Json)
        .map_err(|e| {
            if e.is_foreign_key_violation() { AppError::NotFound(PRODUCT_NOT_FOUND.to_string()) } else { e.into() }
        })
}

pub async fn remove_favorite(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FavoriteRequest>,
) -> Result<Json<Value>> {
    FavoriteRepository::new(state.pool()).remove(user.id, request.product_id).await?;
    Ok(Json(json!({ "success": true })))
}

/// The caller's orders, newest first, with their lines.
pub async fn list_orders(RequireAuth(user): RequireAuth, State(state): State<AppState>) -> Result<Json<Vec<OrderDetail>>> {
    Ok(Json(OrderRepository::new(state.pool()).list_for_user(user.id).await?))
}
