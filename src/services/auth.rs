//! Customer accounts: signup, password login and profile edits.
//!
//! Passwords are hashed with Argon2id. Emails are stored lowercased and
//! phones in `+216XXXXXXXX` form.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::users::{NewUser, ProfileChanges};
use crate::db::{RepositoryError, UserRepository};
use crate::domain::aggregates::{Profile, Role, User};
use crate::domain::value_objects::PhoneNumber;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email ou mot de passe incorrect")]
    InvalidCredentials,

    #[error("Cet email est déjà utilisé")]
    EmailTaken,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Numéro de téléphone invalide")]
    InvalidPhone,

    #[error("Utilisateur non trouvé")]
    UserNotFound,

    #[error("password hashing failed")]
    PasswordHash,

    #[error("database error: {0}")]
    Database(#[from] RepositoryError),
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "Tous les champs sont requis"), email(message = "Email invalide"))]
    pub email: String,
    #[validate(length(min = 1, message = "Tous les champs sont requis"))]
    pub password: String,
    #[validate(length(min = 1, message = "Tous les champs sont requis"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Tous les champs sont requis"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Tous les champs sont requis"))]
    pub phone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile edit; absent fields keep their value, an absent password keeps the hash.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 1, message = "Le prénom est requis"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Le nom est requis"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Email invalide"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { users: UserRepository::new(pool) }
    }

    /// Creates a customer account.
    ///
    /// # Errors
    ///
    /// `EmailTaken`, `WeakPassword` or `InvalidPhone` for bad input.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: SignupRequest) -> Result<User, AuthError> {
        let email = normalize_email(&request.email);
        validate_password(&request.password)?;
        if !PhoneNumber::is_valid(&request.phone) {
            return Err(AuthError::InvalidPhone);
        }
        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let new = NewUser {
            email,
            password_hash: hash_password(&request.password)?,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            phone: Some(PhoneNumber::normalize(&request.phone).into_inner()),
            role: Role::Customer,
        };
        let user = self.users.create(new).await.map_err(|e| {
            if e.is_unique_violation() { AuthError::EmailTaken } else { AuthError::Database(e) }
        })?;

        info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    /// # Errors
    ///
    /// `InvalidCredentials` whether the email is unknown or the password wrong.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &user.password_hash)?;
        Ok(user)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<Profile, AuthError> {
        let user = self.users.get_by_id(user_id).await?.ok_or(AuthError::UserNotFound)?;
        Ok(Profile::from(user))
    }

    /// # Errors
    ///
    /// `EmailTaken` when the new email belongs to another account.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<Profile, AuthError> {
        let current = self.users.get_by_id(user_id).await?.ok_or(AuthError::UserNotFound)?;

        let email = update.email.as_deref().map_or_else(|| current.email.clone(), normalize_email);
        if email != current.email {
            if let Some(other) = self.users.get_by_email(&email).await? {
                if other.id != user_id {
                    return Err(AuthError::EmailTaken);
                }
            }
        }

        let phone = match update.phone.as_deref().map(str::trim) {
            None => current.phone,
            Some("") => None,
            Some(raw) if PhoneNumber::is_valid(raw) => Some(PhoneNumber::normalize(raw).into_inner()),
            Some(_) => return Err(AuthError::InvalidPhone),
        };

        let password_hash = match update.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let changes = ProfileChanges {
            email,
            first_name: update.first_name.map_or(current.first_name, |v| v.trim().to_string()),
            last_name: update.last_name.map_or(current.last_name, |v| v.trim().to_string()),
            phone,
            password_hash,
        };
        self.users
            .update_profile(user_id, changes)
            .await
            .map_err(|e| if e.is_unique_violation() { AuthError::EmailTaken } else { AuthError::Database(e) })?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Trimmed and lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// # Errors
///
/// `WeakPassword` when shorter than [`MIN_PASSWORD_LENGTH`] characters.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Le mot de passe doit contenir au moins {MIN_PASSWORD_LENGTH} caractères"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}
