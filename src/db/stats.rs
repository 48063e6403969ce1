//! Back-office dashboard aggregates.

use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;
use crate::domain::aggregates::{OrderSummary, Product};
use crate::domain::value_objects::Money;

const RECENT_ORDERS: i64 = 10;
const POPULAR_PRODUCTS: i64 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Sum of totals over every order that is not cancelled.
    pub total_revenue: Money,
    pub total_orders: i64,
    pub total_products: i64,
    pub total_users: i64,
    pub recent_orders: Vec<OrderSummary>,
    pub popular_products: Vec<PopularProduct>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PopularProduct {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub product: Product,
    /// Number of order lines referencing the product.
    pub order_item_count: i64,
}

pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, RepositoryError> {
        let (total_revenue, total_orders, total_products, total_users): (Money, i64, i64, i64) = sqlx::query_as(
            "SELECT \
               COALESCE((SELECT SUM(total) FROM orders WHERE status <> 'CANCELLED'), 0), \
               (SELECT COUNT(*) FROM orders), \
               (SELECT COUNT(*) FROM products), \
               (SELECT COUNT(*) FROM users)",
        )
        .fetch_one(self.pool)
        .await?;

        let recent_orders = sqlx::query_as::<_, OrderSummary>(
            "SELECT o.id, o.user_id, o.shipping_address_id, o.subtotal, o.shipping_cost, o.gift_wrap_cost, o.total, \
             o.status, o.tracking_number, o.payment_intent_id, o.created_at, o.updated_at, u.email AS user_email \
             FROM orders o JOIN users u ON u.id = o.user_id ORDER BY o.created_at DESC LIMIT $1",
        )
        .bind(RECENT_ORDERS)
        .fetch_all(self.pool)
        .await?;

        let popular_products = sqlx::query_as::<_, PopularProduct>(
            "SELECT p.id, p.name, p.description, p.price, p.original_price, p.stock, p.is_active, p.is_customizable, \
             p.customization_options, p.images, p.category_id, p.created_at, p.updated_at, \
             COUNT(oi.id) AS order_item_count \
             FROM products p LEFT JOIN order_items oi ON oi.product_id = p.id \
             GROUP BY p.id ORDER BY order_item_count DESC, p.created_at DESC LIMIT $1",
        )
        .bind(POPULAR_PRODUCTS)
        .fetch_all(self.pool)
        .await?;

        tracing::debug!(revenue = %total_revenue, total_orders, "Dashboard stats computed");

        Ok(DashboardStats { total_revenue, total_orders, total_products, total_users, recent_orders, popular_products })
    }
}
