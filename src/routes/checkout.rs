//! Checkout: order placement followed by payment intent creation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, instrument};
use uuid::Uuid;

use super::{ApiJson, ApiPath};
use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::checkout::{CheckoutRequest, CheckoutService, PaymentStepError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub client_secret: String,
    pub order_id: Uuid,
}

/// The order is committed before the processor is called. When the intent
/// cannot be opened the order stays PENDING and its id is returned with the
/// error so the client can retry.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<Response> {
    let service = CheckoutService::new(state.pool(), state.payments());
    let order = service.place_order(user.id, &request).await?;

    match service.open_payment(&order).await {
        Ok(intent) => Ok(Json(CheckoutResponse { client_secret: intent.client_secret, order_id: order.id }).into_response()),
        Err(e) => {
            error!(order_id = %order.id, error = %e, "Payment intent creation failed");
            let body = json!({ "error": "Le paiement n'a pas pu être initialisé", "orderId": order.id });
            Ok((StatusCode::BAD_GATEWAY, Json(body)).into_response())
        }
    }
}

/// Opens an intent for one of the caller's PENDING orders that has none yet.
#[instrument(skip_all, fields(user_id = %user.id, order_id = %order_id))]
pub async fn retry_payment_intent(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Json<CheckoutResponse>> {
    let order = OrderRepository::new(state.pool())
        .find_for_user(order_id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Commande non trouvée".to_string()))?;

    let intent = CheckoutService::new(state.pool(), state.payments())
        .open_payment(&order)
        .await
        .map_err(|e| match e {
            PaymentStepError::NotPayable(_) => {
                AppError::Conflict("Cette commande a déjà un paiement en cours".to_string())
            }
            PaymentStepError::Gateway(e) => AppError::Payment(e),
            PaymentStepError::Database(e) => AppError::Database(e),
        })?;
    Ok(Json(CheckoutResponse { client_secret: intent.client_secret, order_id: order.id }))
}
