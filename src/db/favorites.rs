//! Favorites repository.

use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::{Favorite, FavoriteWithProduct, Product};

#[derive(sqlx::FromRow)]
struct FavoriteRow {
    favorite_id: Uuid,
    favorite_created_at: chrono::DateTime<chrono::Utc>,
    user_id: Uuid,
    #[sqlx(flatten)]
    product: Product,
}

pub struct FavoriteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FavoriteRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The caller's favorites with their products, most recent first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<FavoriteWithProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            "SELECT f.id AS favorite_id, f.created_at AS favorite_created_at, f.user_id, \
             p.id, p.name, p.description, p.price, p.original_price, p.stock, p.is_active, p.is_customizable, \
             p.customization_options, p.images, p.category_id, p.created_at, p.updated_at \
             FROM favorites f JOIN products p ON p.id = f.product_id \
             WHERE f.user_id = $1 ORDER BY f.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FavoriteWithProduct {
                favorite: Favorite {
                    id: row.favorite_id,
                    user_id: row.user_id,
                    product_id: row.product.id,
                    created_at: row.favorite_created_at,
                },
                product: row.product,
            })
            .collect())
    }

    /// Idempotent: adding an existing pair returns the stored record.
    pub async fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<Favorite, RepositoryError> {
        // The no-op update makes RETURNING yield the existing row, even one
        // committed concurrently.
        let favorite = sqlx::query_as::<_, Favorite>(
            "INSERT INTO favorites (id, user_id, product_id) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING id, user_id, product_id, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(favorite)
    }

    /// Removing an absent pair is not an error.
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn exists(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND product_id = $2)")
                .bind(user_id)
                .bind(product_id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }
}
