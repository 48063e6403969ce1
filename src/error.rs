//! Unified error handling.
//!
//! Every handler returns `Result<T, AppError>`; the error is turned into a
//! `{ "error": "..." }` body at the boundary. Server-side failures are logged
//! with their detail and answered with a generic message.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::PaymentError;

const INTERNAL_MESSAGE: &str = "Erreur interne du serveur";

#[derive(Debug, Error)]
pub enum AppError {
    /// No session, or the session has no user.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing resource, or one owned by someone else.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input, duplicate key, insufficient stock.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The resource is in a state that forbids the operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(m) | Self::Forbidden(m) | Self::NotFound(m) | Self::Validation(m) | Self::Conflict(m) => {
                m.clone()
            }
            Self::Payment(_) => "Le service de paiement est indisponible".to_string(),
            Self::Database(_) | Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self { Self::Validation(rejection.body_text()) }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self { Self::Validation(rejection.body_text()) }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self { Self::Validation(rejection.body_text()) }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self { Self::Internal(format!("session: {err}")) }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| errs.iter().map(move |e| e.message.as_ref().map_or_else(|| format!("{field} invalide"), ToString::to_string)))
            .min()
            .unwrap_or_else(|| "Requête invalide".to_string());
        Self::Validation(message)
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Database(e) => Self::Database(e),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::EmailTaken | AuthError::WeakPassword(_) | AuthError::InvalidPhone => Self::Validation(err.to_string()),
            AuthError::UserNotFound => Self::NotFound(err.to_string()),
            AuthError::PasswordHash => Self::Internal(err.to_string()),
            AuthError::Database(e) => Self::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
