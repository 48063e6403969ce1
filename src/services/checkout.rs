//! Order placement.
//!
//! `place_order` runs as one transaction: the ordered product rows are locked,
//! the request is checked against them, then the shipping address, the order,
//! its lines and the stock decrements are written. Opening the payment intent
//! is a separate step (`open_payment`) because it calls the processor; when it
//! fails the order stays PENDING without a reference and can be retried.

use std::collections::BTreeMap;

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::orders::{NewOrder, NewOrderItem};
use crate::db::{AddressRepository, OrderRepository, ProductRepository, RepositoryError};
use crate::domain::aggregates::{AddressInput, CheckoutItem, Order, OrderStatus, OrderTotals, Product, ProductError};
use crate::domain::shipping::shipping_cost;
use crate::domain::value_objects::{Governorate, Money, PhoneNumber, INVALID_PHONE};
use crate::services::payments::{PaymentError, PaymentGateway, PaymentIntent, PaymentIntentRequest};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
    pub shipping_address: AddressInput,
    #[serde(default)]
    pub gift_wrap: bool,
    /// Cost the client displayed; must match the server's tariff when present.
    #[serde(default)]
    pub shipping_cost: Option<Money>,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Le panier est vide")]
    EmptyCart,

    #[error("{0}")]
    InvalidAddress(String),

    #[error("Produit {product_id} non trouvé")]
    ProductNotFound { product_id: Uuid },

    #[error("Stock insuffisant pour {product} (Disponible: {available})")]
    StockInsufficient { product: String, available: i32 },

    #[error("Le prix de {product} a changé")]
    PriceMismatch { product: String },

    #[error("Frais de livraison incorrects (attendu: {expected})")]
    ShippingCostMismatch { expected: Money },

    #[error("Personnalisation invalide pour {product}: {reason}")]
    InvalidCustomization { product: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(RepositoryError::from(err))
    }
}

impl From<ProductError> for CheckoutError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::InvalidCustomization { product, reason } => Self::InvalidCustomization { product, reason },
        }
    }
}

/// Failure to attach a payment intent to an existing order.
#[derive(Debug, Error)]
pub enum PaymentStepError {
    #[error(transparent)]
    Gateway(#[from] PaymentError),

    /// The order already references an intent, or is no longer pending.
    #[error("order {0} cannot take a new payment intent")]
    NotPayable(Uuid),

    #[error("database error: {0}")]
    Database(#[from] RepositoryError),
}

/// Everything the transaction writes, computed from the locked products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOrder {
    pub totals: OrderTotals,
    pub items: Vec<NewOrderItem>,
    /// Units to take from each product, ordered by product id.
    pub decrements: Vec<(Uuid, i32)>,
}

/// Checks that need no database: a non-empty cart and a deliverable address.
pub fn validate_request(request: &CheckoutRequest) -> Result<Governorate, CheckoutError> {
    if request.items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    request.shipping_address.validate().map_err(|errors| {
        let message = errors
            .field_errors()
            .into_values()
            .flat_map(|errs| errs.iter().filter_map(|e| e.message.as_ref().map(ToString::to_string)))
            .min()
            .unwrap_or_else(|| "Adresse de livraison invalide".to_string());
        CheckoutError::InvalidAddress(message)
    })?;
    let governorate =
        request.shipping_address.governorate().map_err(|e| CheckoutError::InvalidAddress(e.to_string()))?;
    if !PhoneNumber::is_valid(&request.shipping_address.phone) {
        return Err(CheckoutError::InvalidAddress(INVALID_PHONE.to_string()));
    }
    Ok(governorate)
}

/// Checks the request against current product rows and computes the order.
///
/// Lines of the same product are summed before the stock check. Inactive
/// products are treated as missing.
pub fn prepare(request: &CheckoutRequest, products: &[Product]) -> Result<PreparedOrder, CheckoutError> {
    let governorate = validate_request(request)?;
    let find = |id: Uuid| products.iter().find(|p| p.id == id && p.is_active);

    let mut wanted: BTreeMap<Uuid, u64> = BTreeMap::new();
    for item in &request.items {
        let product = find(item.product_id).ok_or(CheckoutError::ProductNotFound { product_id: item.product_id })?;
        if item.price != product.price {
            return Err(CheckoutError::PriceMismatch { product: product.name.clone() });
        }
        product.validate_customization(item.customization.as_ref())?;
        *wanted.entry(product.id).or_default() += u64::from(item.quantity.value());
    }

    let mut decrements = Vec::with_capacity(wanted.len());
    for (id, quantity) in wanted {
        let product = find(id).ok_or(CheckoutError::ProductNotFound { product_id: id })?;
        let quantity = i32::try_from(quantity)
            .ok()
            .filter(|q| *q <= product.stock)
            .ok_or_else(|| CheckoutError::StockInsufficient { product: product.name.clone(), available: product.stock })?;
        decrements.push((id, quantity));
    }

    let tariff = shipping_cost(governorate);
    if let Some(submitted) = request.shipping_cost {
        if submitted != tariff {
            return Err(CheckoutError::ShippingCostMismatch { expected: tariff });
        }
    }

    let items = request
        .items
        .iter()
        .map(|item| NewOrderItem {
            product_id: item.product_id,
            // Bounded by the stock check above.
            quantity: i32::try_from(item.quantity.value()).unwrap_or(i32::MAX),
            price: item.price,
            customization: item.customization.clone(),
        })
        .collect();

    Ok(PreparedOrder { totals: OrderTotals::compute(&request.items, tariff, request.gift_wrap), items, decrements })
}

pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    payments: &'a dyn PaymentGateway,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, payments: &'a dyn PaymentGateway) -> Self {
        Self { pool, payments }
    }

    /// Creates a PENDING order. Nothing is persisted unless every check passes.
    #[instrument(skip(self, request), fields(lines = request.items.len()))]
    pub async fn place_order(&self, user_id: Uuid, request: &CheckoutRequest) -> Result<Order, CheckoutError> {
        validate_request(request)?;

        let mut ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut tx = self.pool.begin().await?;
        let products = ProductRepository::lock_for_checkout(&mut tx, &ids).await?;
        let prepared = prepare(request, &products).inspect_err(|e| {
            if matches!(e, CheckoutError::StockInsufficient { .. }) {
                warn!(%user_id, error = %e, "Checkout rejected");
            }
        })?;

        let address = AddressRepository::insert_for_checkout(&mut tx, user_id, &request.shipping_address).await?;
        let order = OrderRepository::insert(
            &mut tx,
            &NewOrder { user_id, shipping_address_id: address.id, totals: prepared.totals },
            &prepared.items,
        )
        .await?;

        for (product_id, quantity) in &prepared.decrements {
            if !ProductRepository::decrement_stock(&mut tx, *product_id, *quantity).await? {
                let product = products.iter().find(|p| p.id == *product_id);
                return Err(CheckoutError::StockInsufficient {
                    product: product.map(|p| p.name.clone()).unwrap_or_default(),
                    available: product.map_or(0, |p| p.stock),
                });
            }
        }
        tx.commit().await?;

        info!(order_id = %order.id, total = %order.total, "Order placed");
        Ok(order)
    }

    /// Opens a payment intent for the order total and records its reference.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn open_payment(&self, order: &Order) -> Result<PaymentIntent, PaymentStepError> {
        if order.payment_intent_id.is_some() || order.status != OrderStatus::Pending {
            return Err(PaymentStepError::NotPayable(order.id));
        }
        let intent = self
            .payments
            .create_payment_intent(&PaymentIntentRequest { order_id: order.id, user_id: order.user_id, amount: order.total })
            .await?;

        if !OrderRepository::new(self.pool).set_payment_intent(order.id, &intent.id).await? {
            warn!(payment_intent_id = %intent.id, "Order already had a payment intent");
            return Err(PaymentStepError::NotPayable(order.id));
        }
        Ok(intent)
    }
}
