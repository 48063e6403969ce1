//! Product repository.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::{CustomizationOptions, Product};
use crate::domain::value_objects::Money;

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.price, p.original_price, p.stock, p.is_active, \
     p.is_customizable, p.customization_options, p.images, p.category_id, p.created_at, p.updated_at";

/// Catalog ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl CatalogSort {
    fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC",
            Self::PriceAsc => " ORDER BY p.price ASC, p.created_at DESC",
            Self::PriceDesc => " ORDER BY p.price DESC, p.created_at DESC",
            Self::Name => " ORDER BY p.name ASC",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CatalogFilter {
    pub category_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
    pub sort: CatalogSort,
}

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub category_id: Uuid,
    pub is_customizable: bool,
    pub customization_options: Option<CustomizationOptions>,
    pub images: Vec<String>,
    pub stock: i32,
}

/// Partial update; `None` leaves a column untouched, `Some(None)` clears it.
#[derive(Clone, Debug, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub original_price: Option<Option<Money>>,
    pub category_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub is_customizable: Option<bool>,
    pub customization_options: Option<Option<CustomizationOptions>>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryRef { pub id: Uuid, pub name: String }

#[derive(Clone, Debug, Serialize)]
pub struct ProductWithCategory {
    #[serde(flatten)]
    pub product: Product,
    pub category: CategoryRef,
}

#[derive(sqlx::FromRow)]
struct ProductCategoryRow {
    #[sqlx(flatten)]
    product: Product,
    category_name: String,
}

impl From<ProductCategoryRow> for ProductWithCategory {
    fn from(row: ProductCategoryRow) -> Self {
        let category = CategoryRef { id: row.product.category_id, name: row.category_name };
        Self { product: row.product, category }
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active products matching the catalog filter.
    pub async fn list_catalog(&self, filter: &CatalogFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.is_active"));
        if let Some(category_id) = filter.category_id {
            qb.push(" AND p.category_id = ").push_bind(category_id);
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND p.price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND p.price <= ").push_bind(max);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (p.name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR p.description ILIKE ").push_bind(pattern).push(")");
        }
        qb.push(filter.sort.order_by());

        Ok(qb.build_query_as::<Product>().fetch_all(self.pool).await?)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Every product with its category, newest first.
    pub async fn list_with_category(&self) -> Result<Vec<ProductWithCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductCategoryRow>(&format!(
            "SELECT {PRODUCT_COLUMNS}, c.name AS category_name FROM products p \
             JOIN categories c ON c.id = p.category_id ORDER BY p.created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (id, name, description, price, original_price, stock, is_active, is_customizable, \
             customization_options, images, category_id) VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8, $9, $10) \
             RETURNING id, name, description, price, original_price, stock, is_active, is_customizable, \
             customization_options, images, category_id, created_at, updated_at",
        )
        .bind(Uuid::now_v7())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.original_price)
        .bind(new.stock)
        .bind(new.is_customizable)
        .bind(new.customization_options.map(Json))
        .bind(&new.images)
        .bind(new.category_id)
        .fetch_one(self.pool)
        .await?;
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, changes: ProductChanges) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET \
               name = COALESCE($2, name), \
               description = COALESCE($3, description), \
               price = COALESCE($4, price), \
               original_price = CASE WHEN $5 THEN $6 ELSE original_price END, \
               category_id = COALESCE($7, category_id), \
               is_active = COALESCE($8, is_active), \
               is_customizable = COALESCE($9, is_customizable), \
               customization_options = CASE WHEN $10 THEN $11 ELSE customization_options END, \
               images = COALESCE($12, images), \
               stock = COALESCE($13, stock), \
               updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, name, description, price, original_price, stock, is_active, is_customizable, \
             customization_options, images, category_id, created_at, updated_at",
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.price)
        .bind(changes.original_price.is_some())
        .bind(changes.original_price.flatten())
        .bind(changes.category_id)
        .bind(changes.is_active)
        .bind(changes.is_customizable)
        .bind(changes.customization_options.is_some())
        .bind(changes.customization_options.flatten().map(Json))
        .bind(changes.images)
        .bind(changes.stock)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// Locks the rows until the surrounding transaction ends. Ordered by id so
    /// concurrent checkouts acquire locks in the same order.
    pub async fn lock_for_checkout(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ANY($1) ORDER BY p.id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(conn)
        .await?;
        Ok(products)
    }

    /// Returns `false` when the stock would go negative.
    pub async fn decrement_stock(conn: &mut PgConnection, id: Uuid, quantity: i32) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2")
            .bind(id)
            .bind(quantity)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
