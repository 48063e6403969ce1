//! Signup, login and logout.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tower_sessions::Session;
use validator::Validate;

use super::ApiJson;
use crate::domain::aggregates::Profile;
use crate::error::Result;
use crate::middleware::{clear_current_user, set_current_user, CurrentUser};
use crate::services::auth::{AuthService, LoginRequest, SignupRequest};
use crate::state::AppState;

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    request.validate()?;
    let user = AuthService::new(state.pool()).register(request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Compte créé avec succès", "userId": user.id }))))
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<Profile>> {
    let user = AuthService::new(state.pool()).authenticate(&request.email, &request.password).await?;
    set_current_user(&session, &CurrentUser::from(&user)).await?;
    tracing::info!(user_id = %user.id, "Signed in");
    Ok(Json(Profile::from(user)))
}

pub async fn logout(session: Session) -> Result<Json<Value>> {
    clear_current_user(&session).await?;
    Ok(Json(json!({ "success": true })))
}
