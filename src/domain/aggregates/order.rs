//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use crate::domain::aggregates::address::Address;
use crate::domain::aggregates::product::Customization;
use crate::domain::shipping::gift_wrap_cost;
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shipping_address_id: Uuid,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub gift_wrap_cost: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price when the order was placed.
    pub price: Money,
    pub customization: Option<Json<Customization>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus { #[default] Pending, Confirmed, Shipped, Delivered, Cancelled }

impl OrderStatus {
    /// Whether `next` follows the normal lifecycle. Admins may still set any status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Shipped) | (Shipped, Delivered)
                | (Pending, Cancelled) | (Confirmed, Cancelled)
        ) || *self == next
    }
}

/// One line of a checkout request, as submitted by the cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub price: Money,
    #[serde(default)]
    pub customization: Option<Customization>,
}

impl CheckoutItem {
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity.value()) }
}

/// Amounts frozen on the order at creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub gift_wrap_cost: Money,
    pub total: Money,
}

impl OrderTotals {
    pub fn compute(items: &[CheckoutItem], shipping_cost: Money, gift_wrap: bool) -> Self {
        let subtotal: Money = items.iter().map(CheckoutItem::line_total).sum();
        let gift_wrap_cost = gift_wrap_cost(gift_wrap);
        Self { subtotal, shipping_cost, gift_wrap_cost, total: subtotal + shipping_cost + gift_wrap_cost }
    }
}

/// Order line joined with the product it refers to.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: OrderItem,
    pub product_name: String,
    pub product_images: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItemDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

/// Order row for back-office listings.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub user_email: String,
}
