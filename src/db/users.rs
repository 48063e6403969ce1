//! User repository.

use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::{Profile, Role, User};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, role, created_at, updated_at";
const PROFILE_COLUMNS: &str = "id, email, first_name, last_name, phone, role, created_at";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// Profile columns to overwrite; a `None` hash keeps the current password.
#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fails with a unique violation when the email is taken.
    pub async fn create(&self, new: NewUser) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, phone, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.phone)
        .bind(new.role)
        .fetch_one(self.pool)
        .await?;
        Ok(user)
    }

    /// Case-insensitive lookup.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"))
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    pub async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<Option<Profile>, RepositoryError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "UPDATE users SET email = $2, first_name = $3, last_name = $4, phone = $5, \
             password_hash = COALESCE($6, password_hash), updated_at = NOW() \
             WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.phone)
        .bind(&changes.password_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(profile)
    }

    /// Newest accounts first.
    pub async fn list(&self) -> Result<Vec<Profile>, RepositoryError> {
        let users = sqlx::query_as::<_, Profile>(&format!("SELECT {PROFILE_COLUMNS} FROM users ORDER BY created_at DESC"))
            .fetch_all(self.pool)
            .await?;
        Ok(users)
    }
}
