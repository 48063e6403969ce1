//! Order repository.

use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::{
    Address, Customization, Order, OrderDetail, OrderItemDetail, OrderStatus, OrderSummary, OrderTotals,
};
use crate::domain::value_objects::Money;

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.shipping_address_id, o.subtotal, o.shipping_cost, o.gift_wrap_cost, \
     o.total, o.status, o.tracking_number, o.payment_intent_id, o.created_at, o.updated_at";

const ITEM_DETAIL_QUERY: &str = "SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.price, oi.customization, \
     p.name AS product_name, p.images AS product_images \
     FROM order_items oi JOIN products p ON p.id = oi.product_id \
     WHERE oi.order_id = ANY($1) ORDER BY oi.order_id, oi.position";

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub shipping_address_id: Uuid,
    pub totals: OrderTotals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Money,
    pub customization: Option<Customization>,
}

/// Outcome of a payment confirmation.
#[derive(Debug)]
pub enum PaymentConfirmation {
    Confirmed(Order),
    /// The order exists but is already shipped, delivered or cancelled.
    Unchanged { order_id: Uuid, status: OrderStatus },
    NotFound,
}

#[derive(Debug, sqlx::FromRow)]
pub struct StatusChange {
    #[sqlx(flatten)]
    pub order: Order,
    pub previous_status: OrderStatus,
}

#[derive(sqlx::FromRow)]
struct OrderWithEmail {
    #[sqlx(flatten)]
    order: Order,
    user_email: String,
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a PENDING order and its lines, in submission order.
    pub async fn insert(conn: &mut PgConnection, order: &NewOrder, items: &[NewOrderItem]) -> Result<Order, RepositoryError> {
        let t = &order.totals;
        let created = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, user_id, shipping_address_id, subtotal, shipping_cost, gift_wrap_cost, total, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING') \
             RETURNING id, user_id, shipping_address_id, subtotal, shipping_cost, gift_wrap_cost, total, status, \
             tracking_number, payment_intent_id, created_at, updated_at",
        )
        .bind(Uuid::now_v7())
        .bind(order.user_id)
        .bind(order.shipping_address_id)
        .bind(t.subtotal)
        .bind(t.shipping_cost)
        .bind(t.gift_wrap_cost)
        .bind(t.total)
        .fetch_one(&mut *conn)
        .await?;

        for (position, item) in (0_i32..).zip(items) {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, position, quantity, price, customization) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(Uuid::now_v7())
            .bind(created.id)
            .bind(item.product_id)
            .bind(position)
            .bind(item.quantity)
            .bind(item.price)
            .bind(item.customization.clone().filter(|c| !c.is_empty()).map(Json))
            .execute(&mut *conn)
            .await?;
        }
        Ok(created)
    }

    /// Records the payment reference once. Returns `false` if the order already has one.
    pub async fn set_payment_intent(&self, order_id: Uuid, payment_intent_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_intent_id = $2, updated_at = NOW() WHERE id = $1 AND payment_intent_id IS NULL",
        )
        .bind(order_id)
        .bind(payment_intent_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Marks the order paid. Orders already past CONFIRMED are left alone so a
    /// late redelivery cannot move a shipped order back.
    pub async fn confirm_by_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentConfirmation, RepositoryError> {
        let confirmed = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders o SET status = 'CONFIRMED', updated_at = NOW() \
             WHERE o.payment_intent_id = $1 AND o.status IN ('PENDING', 'CONFIRMED') \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;
        if let Some(order) = confirmed {
            return Ok(PaymentConfirmation::Confirmed(order));
        }

        let current: Option<(Uuid, OrderStatus)> =
            sqlx::query_as("SELECT id, status FROM orders WHERE payment_intent_id = $1")
                .bind(payment_intent_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(match current {
            Some((order_id, status)) => PaymentConfirmation::Unchanged { order_id, status },
            None => PaymentConfirmation::NotFound,
        })
    }

    pub async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 AND o.user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// The caller's orders, newest first, with their lines.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderDetail>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.user_id = $1 ORDER BY o.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items = self.items_by_order(&ids).await?;
        Ok(orders
            .into_iter()
            .map(|order| OrderDetail {
                items: items.remove(&order.id).unwrap_or_default(),
                order,
                shipping_address: None,
                user_email: None,
            })
            .collect())
    }

    /// Every order with its buyer's email, newest first.
    pub async fn list_all(&self) -> Result<Vec<OrderSummary>, RepositoryError> {
        let orders = sqlx::query_as::<_, OrderSummary>(&format!(
            "SELECT {ORDER_COLUMNS}, u.email AS user_email FROM orders o JOIN users u ON u.id = o.user_id \
             ORDER BY o.created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// Back-office view: lines, shipping address and buyer.
    pub async fn find_detail(&self, id: Uuid) -> Result<Option<OrderDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderWithEmail>(&format!(
            "SELECT {ORDER_COLUMNS}, u.email AS user_email FROM orders o JOIN users u ON u.id = o.user_id WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        let Some(OrderWithEmail { order, user_email }) = row else { return Ok(None) };

        let shipping_address = sqlx::query_as::<_, Address>(
            "SELECT id, user_id, label, first_name, last_name, phone, governorate, city, street, postal_code, \
             is_default, created_at FROM addresses WHERE id = $1",
        )
        .bind(order.shipping_address_id)
        .fetch_optional(self.pool)
        .await?;

        let items = self.items_by_order(&[order.id]).await?.remove(&order.id).unwrap_or_default();
        Ok(Some(OrderDetail { order, items, shipping_address, user_email: Some(user_email) }))
    }

    /// Sets any status and returns the order with the status it had before.
    /// `tracking_number`: `None` keeps it, `Some(None)` clears it.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        tracking_number: Option<Option<String>>,
    ) -> Result<Option<StatusChange>, RepositoryError> {
        let change = sqlx::query_as::<_, StatusChange>(&format!(
            "WITH previous AS (SELECT id, status FROM orders WHERE id = $1 FOR UPDATE) \
             UPDATE orders o SET status = $2, \
             tracking_number = CASE WHEN $3 THEN $4 ELSE o.tracking_number END, updated_at = NOW() \
             FROM previous WHERE o.id = previous.id \
             RETURNING {ORDER_COLUMNS}, previous.status AS previous_status"
        ))
        .bind(id)
        .bind(status)
        .bind(tracking_number.is_some())
        .bind(tracking_number.flatten())
        .fetch_optional(self.pool)
        .await?;
        Ok(change)
    }

    async fn items_by_order(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItemDetail>>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, OrderItemDetail>(ITEM_DETAIL_QUERY)
            .bind(order_ids)
            .fetch_all(self.pool)
            .await?;
        let mut grouped: HashMap<Uuid, Vec<OrderItemDetail>> = HashMap::new();
        for row in rows {
            grouped.entry(row.item.order_id).or_default().push(row);
        }
        Ok(grouped)
    }
}
