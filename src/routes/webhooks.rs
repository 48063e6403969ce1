//! Payment processor callbacks.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::db::orders::PaymentConfirmation;
use crate::db::OrderRepository;
use crate::error::Result;
use crate::services::payments::{verify_signature, WebhookEvent, PAYMENT_SUCCEEDED, SIGNATURE_HEADER};
use crate::state::AppState;

fn rejected(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Verifies the signature over the raw body, then confirms the order on
/// `payment_intent.succeeded`. Other event types are acknowledged untouched.
pub async fn payment(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let Some(header) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return Ok(rejected("No signature"));
    };
    let now = chrono::Utc::now().timestamp();
    if let Err(e) = verify_signature(&body, header, &state.config().payment.webhook_secret, now) {
        warn!(error = %e, "Webhook signature rejected");
        return Ok(rejected("Invalid signature"));
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Undecodable webhook payload");
            return Ok(rejected("Invalid payload"));
        }
    };

    if event.kind != PAYMENT_SUCCEEDED {
        debug!(event_type = %event.kind, "Webhook event ignored");
        return Ok(Json(json!({ "received": true })).into_response());
    }

    let Some(intent_id) = event.object_id() else {
        warn!("Payment event without an intent id");
        return Ok(rejected("Invalid payload"));
    };
    match OrderRepository::new(state.pool()).confirm_by_payment_intent(intent_id).await? {
        PaymentConfirmation::Confirmed(order) => {
            info!(order_id = %order.id, payment_intent_id = %intent_id, "Order confirmed");
        }
        PaymentConfirmation::Unchanged { order_id, status } => {
            warn!(%order_id, ?status, payment_intent_id = %intent_id, "Payment event for an order past confirmation");
        }
        PaymentConfirmation::NotFound => warn!(payment_intent_id = %intent_id, "No order for payment intent"),
    }

    Ok(Json(json!({ "received": true })).into_response())
}
