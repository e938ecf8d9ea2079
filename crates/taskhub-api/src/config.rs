//! API server configuration loaded from environment variables.

use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Default identity-store round-trip bound, in milliseconds.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;

/// Errors during configuration loading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    Missing(String),
    /// An environment variable could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// The external shared secret and the session-signing secret are equal.
    #[error("TELEGRAM_BOT_TOKEN and JWT_SECRET must differ")]
    SecretReused,
    /// A secret was rejected by the auth layer.
    #[error("unusable secret: {0}")]
    Secret(String),
}

/// Secrets and limits for claim verification and session issuance.
#[derive(Clone)]
pub struct AuthConfig {
    /// Bot credential shared with the claim-issuing party.
    pub bot_token: String,
    /// Private key for session credentials.
    pub session_secret: String,
    /// Bound on each identity-store round trip.
    pub store_timeout: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("bot_token", &"<redacted>")
            .field("session_secret", &"<redacted>")
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

/// API server runtime configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// TCP address to bind (e.g. `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Verification and session settings.
    pub auth: AuthConfig,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing, a value
    /// does not parse, or the two secrets are identical.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ApiConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigError::Missing(key.to_owned()))
        };

        let bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let session_secret = required("JWT_SECRET")?;
        if bot_token == session_secret {
            return Err(ConfigError::SecretReused);
        }

        let store_timeout_ms = match lookup("STORE_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "STORE_TIMEOUT_MS".to_owned(),
                value: raw,
            })?,
            None => DEFAULT_STORE_TIMEOUT_MS,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            auth: AuthConfig {
                bot_token,
                session_secret,
                store_timeout: Duration::from_millis(store_timeout_ms),
            },
        })
    }
}
