//! Payment processor integration.
//!
//! Orders are paid through hosted payment intents: the server creates an
//! intent for the order total and hands its client secret to the browser,
//! then learns about the outcome from a signed webhook.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::domain::value_objects::{Money, MoneyError};

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Event type that confirms an order.
pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("invalid amount: {0}")]
    Amount(#[from] MoneyError),
}

/// What the processor needs to open a charge for an order.
#[derive(Debug, Clone)]
pub struct PaymentIntentRequest {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: Money,
}

/// Handle on an in-progress charge.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent, PaymentError>;
}

/// Stripe-compatible REST client.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    currency: String,
    secret_key: SecretString,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

impl StripeGateway {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self), fields(order_id = %request.order_id, amount = %request.amount))]
    async fn create_payment_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent, PaymentError> {
        let amount = request.amount.to_minor_units()?;
        let params = [
            ("amount", amount.to_string()),
            ("currency", self.currency.clone()),
            ("metadata[orderId]", request.order_id.to_string()),
            ("metadata[userId]", request.user_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body).map_or(body, |b| b.error.message);
            return Err(PaymentError::Api { status: status.as_u16(), message });
        }

        let intent: PaymentIntent = response.json().await?;
        debug!(payment_intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }
}

/// Webhook event envelope. Only the fields the shop acts on are decoded, and
/// all of them except the type may be absent.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub object: Option<WebhookObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookObject {
    #[serde(default)]
    pub id: Option<String>,
}

impl WebhookEvent {
    /// Id of the object the event is about, when it has one.
    pub fn object_id(&self) -> Option<&str> {
        self.data.as_ref()?.object.as_ref()?.id.as_deref()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,

    #[error("signature timestamp outside tolerance")]
    Expired,

    #[error("signature mismatch")]
    Mismatch,

    #[error("invalid signing key")]
    InvalidKey,
}

/// Checks a `t=<unix>,v1=<hex>[,v1=...]` header against the raw body.
///
/// The signed message is `"{t}.{payload}"`; any `v1` entry may match.
pub fn verify_signature(payload: &[u8], header: &str, secret: &SecretString, now: i64) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    let ts: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let mac = signed_mac(payload, timestamp, secret)?;
    let matched = signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());
    if matched { Ok(()) } else { Err(SignatureError::Mismatch) }
}

/// Builds the header a processor would send for `payload` at `timestamp`.
pub fn signature_header(payload: &[u8], secret: &SecretString, timestamp: i64) -> Result<String, SignatureError> {
    let mac = signed_mac(payload, &timestamp.to_string(), secret)?;
    Ok(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
}

fn signed_mac(payload: &[u8], timestamp: &str, secret: &SecretString) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}
