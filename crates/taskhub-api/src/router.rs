//! Axum router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use taskhub_auth::issuer::SessionIssuer;
use taskhub_auth::session::SessionSigner;
use taskhub_auth::store::IdentityStore;
use taskhub_auth::validator::ClaimValidator;

use crate::config::{AuthConfig, ConfigError};
use crate::handlers::accounts::{me_handler, update_me_handler};
use crate::handlers::auth::{auth_handler, init_data_handler};

/// Shared, read-only application state.
pub struct AppState {
    /// Identity storage.
    pub store: Arc<dyn IdentityStore>,
    /// Claim validator holding the key derived from the bot credential.
    pub validator: ClaimValidator,
    /// Session issuer holding the session-signing secret and the store
    /// timeout shared by every handler.
    pub issuer: SessionIssuer,
}

/// Handle passed to every handler.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build state from `store` and the auth configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Secret`] if either secret is unusable.
    pub fn new(store: Arc<dyn IdentityStore>, config: &AuthConfig) -> Result<Self, ConfigError> {
        let validator = ClaimValidator::from_secret(config.bot_token.as_bytes())
            .map_err(|e| ConfigError::Secret(e.to_string()))?;
        let signer = SessionSigner::new(config.session_secret.as_bytes())
            .map_err(|e| ConfigError::Secret(e.to_string()))?;
        let issuer = SessionIssuer::new(Arc::clone(&store), signer)
            .with_store_timeout(config.store_timeout);
        Ok(Self {
            store,
            validator,
            issuer,
        })
    }
}

/// Response body for the health endpoint.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Build the Axum application router.
#[must_use]
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/v1/accounts/auth", post(auth_handler))
        .route("/v1/accounts/auth/init-data", post(init_data_handler))
        .route("/v1/accounts/me", get(me_handler).put(update_me_handler))
        .with_state(state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
