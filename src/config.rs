//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `PAYMENT_SECRET_KEY` - Payment processor API secret key
//! - `PAYMENT_WEBHOOK_SECRET` - Shared secret used to sign webhooks
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `PAYMENT_API_BASE` - Processor base URL (default: <https://api.stripe.com>)
//! - `PAYMENT_CURRENCY` - ISO currency sent to the processor (default: tnd)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `RUN_MIGRATIONS` - Apply `migrations/` at startup (default: true)
//! - `SESSION_SECURE_COOKIE` - Mark the session cookie `Secure` (default: false)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: SecretString,
    pub database_max_connections: u32,
    pub run_migrations: bool,
    pub host: IpAddr,
    pub port: u16,
    pub secure_cookies: bool,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
    pub api_base: String,
    /// Lowercase ISO code, as the processor expects it.
    pub currency: String,
}

impl AppConfig {
    /// Load configuration from the process environment, after `.env`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);
        Ok(Self {
            database_url: SecretString::from(vars.required("DATABASE_URL")?),
            database_max_connections: vars.parsed("DATABASE_MAX_CONNECTIONS", 10)?,
            run_migrations: vars.flag("RUN_MIGRATIONS", true)?,
            host: vars.parsed("HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: vars.parsed("PORT", 8083)?,
            secure_cookies: vars.flag("SESSION_SECURE_COOKIE", false)?,
            payment: PaymentConfig {
                secret_key: SecretString::from(vars.required("PAYMENT_SECRET_KEY")?),
                webhook_secret: SecretString::from(vars.required("PAYMENT_WEBHOOK_SECRET")?),
                api_base: vars.optional("PAYMENT_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string()),
                currency: vars.optional("PAYMENT_CURRENCY").unwrap_or_else(|| "tnd".to_string()).to_lowercase(),
            },
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some("0" | "false" | "no" | "off") => Ok(false),
            Some(other) => Err(ConfigError::InvalidEnvVar(key.to_string(), format!("not a boolean: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/artzy"),
        ("PAYMENT_SECRET_KEY", "sk_test_123"),
        ("PAYMENT_WEBHOOK_SECRET", "whsec_123"),
    ];

    #[test]
    fn test_defaults() {
        let cfg = config(&REQUIRED).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.socket_addr().to_string(), "0.0.0.0:8083");
        assert_eq!(cfg.database_max_connections, 10);
        assert!(cfg.run_migrations);
        assert!(!cfg.secure_cookies);
        assert_eq!(cfg.payment.currency, "tnd");
        assert_eq!(cfg.payment.api_base, "https://api.stripe.com");
        assert_eq!(cfg.payment.secret_key.expose_secret(), "sk_test_123");
    }

    #[test]
    fn test_missing_required() {
        let err = config(&REQUIRED[..2]).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnvVar("PAYMENT_WEBHOOK_SECRET".into()));
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([("PORT", "9000"), ("RUN_MIGRATIONS", "false"), ("PAYMENT_CURRENCY", "TND")]);
        let cfg = config(&pairs).unwrap();
        assert_eq!(cfg.port, 9000);
        assert!(!cfg.run_migrations);
        assert_eq!(cfg.payment.currency, "tnd");

        pairs.push(("DATABASE_MAX_CONNECTIONS", "many"));
        assert!(matches!(config(&pairs), Err(ConfigError::InvalidEnvVar(k, _)) if k == "DATABASE_MAX_CONNECTIONS"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg = config(&REQUIRED).unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("sk_test_123"));
        assert!(!debug.contains("whsec_123"));
    }
}
