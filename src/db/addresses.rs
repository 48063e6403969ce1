//! Address book repository.
//!
//! Every query carries the owner in its predicate, so an id belonging to
//! another account behaves exactly like a missing one.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::{Address, AddressInput, AddressUpdate};

const ADDRESS_COLUMNS: &str =
    "id, user_id, label, first_name, last_name, phone, governorate, city, street, postal_code, is_default, created_at";

/// Label given to addresses captured during checkout.
pub const CHECKOUT_LABEL: &str = "Livraison";

pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(addresses)
    }

    /// Inserts an address book entry. A new default replaces the old one.
    pub async fn create(&self, user_id: Uuid, input: &AddressInput) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if input.is_default {
            Self::clear_default(&mut tx, user_id).await?;
        }
        let address = Self::insert(&mut tx, user_id, input, input.label.as_deref(), input.is_default).await?;
        tx.commit().await?;
        Ok(address)
    }

    /// Checkout variant: never default, labelled [`CHECKOUT_LABEL`].
    pub async fn insert_for_checkout(
        conn: &mut PgConnection,
        user_id: Uuid,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        Self::insert(conn, user_id, input, Some(CHECKOUT_LABEL), false).await
    }

    /// Returns `None` when the caller owns no such address.
    pub async fn update(&self, id: Uuid, user_id: Uuid, update: AddressUpdate) -> Result<Option<Address>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(existing) = existing else { return Ok(None) };

        if update.makes_default() {
            Self::clear_default(&mut tx, user_id).await?;
        }
        let a = update.apply(existing);
        let address = sqlx::query_as::<_, Address>(&format!(
            "UPDATE addresses SET label = $3, first_name = $4, last_name = $5, phone = $6, governorate = $7, \
             city = $8, street = $9, postal_code = $10, is_default = $11 \
             WHERE id = $1 AND user_id = $2 RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(a.id)
        .bind(a.user_id)
        .bind(&a.label)
        .bind(&a.first_name)
        .bind(&a.last_name)
        .bind(&a.phone)
        .bind(&a.governorate)
        .bind(&a.city)
        .bind(&a.street)
        .bind(&a.postal_code)
        .bind(a.is_default)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(address))
    }

    /// Returns `false` when the caller owns no such address.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_default(conn: &mut PgConnection, user_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND is_default")
            .bind(user_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn insert(
        conn: &mut PgConnection,
        user_id: Uuid,
        input: &AddressInput,
        label: Option<&str>,
        is_default: bool,
    ) -> Result<Address, RepositoryError> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "INSERT INTO addresses (id, user_id, label, first_name, last_name, phone, governorate, city, street, \
             postal_code, is_default) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(label)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.normalized_phone())
        .bind(input.governorate.trim())
        .bind(input.city.trim())
        .bind(input.street.trim())
        .bind(&input.postal_code)
        .bind(is_default)
        .fetch_one(conn)
        .await?;
        Ok(address)
    }
}
