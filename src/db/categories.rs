//! Category repository.

use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::{Category, CategoryWithCount};

/// Outcome of a guarded category deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryDeletion {
    Deleted,
    NotFound,
    /// Still referenced by this many products.
    InUse(i64),
}

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories by name. `active_only` restricts the count to active products.
    pub async fn list_with_counts(&self, active_only: bool) -> Result<Vec<CategoryWithCount>, RepositoryError> {
        let categories = sqlx::query_as::<_, CategoryWithCount>(
            "SELECT c.id, c.name, c.created_at, \
                    COUNT(p.id) FILTER (WHERE p.id IS NOT NULL AND (p.is_active OR NOT $1)) AS product_count \
             FROM categories c LEFT JOIN products p ON p.category_id = c.id \
             GROUP BY c.id ORDER BY c.name ASC",
        )
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Fails with a unique violation when the name is taken.
    pub async fn create(&self, name: &str) -> Result<Category, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name) VALUES ($1, $2) RETURNING id, name, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .fetch_one(self.pool)
        .await?;
        Ok(category)
    }

    pub async fn rename(&self, id: Uuid, name: &str) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name, created_at",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// Deletes the category unless products still reference it.
    pub async fn delete(&self, id: Uuid) -> Result<CategoryDeletion, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(CategoryDeletion::NotFound);
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE category_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if count > 0 {
            return Ok(CategoryDeletion::InUse(count));
        }

        sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(CategoryDeletion::Deleted)
    }
}
