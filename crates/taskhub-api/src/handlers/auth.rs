//! POST /v1/accounts/auth and POST /v1/accounts/auth/init-data — sign-in
//! with a Mini App launch payload.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use log::{error, info, warn};
use serde_json::Value;
use taskhub_auth::claim::ExternalClaim;
use taskhub_auth::error::ClaimError;

use crate::models::AuthResponse;
use crate::router::SharedState;

/// Client-visible status for each rejection reason.
#[must_use]
pub fn status_for(err: &ClaimError) -> StatusCode {
    match err {
        ClaimError::Malformed(_) => StatusCode::BAD_REQUEST,
        ClaimError::Expired { .. } => StatusCode::UNAUTHORIZED,
        ClaimError::SignatureMismatch => StatusCode::FORBIDDEN,
    }
}

fn reject(err: &ClaimError) -> StatusCode {
    warn!("launch payload rejected: {err}");
    status_for(err)
}

/// Handle `POST /v1/accounts/auth` — verify a JSON launch payload and
/// return a session credential.
///
/// # Errors
///
/// Returns `400` if the payload is malformed, `401` if it has expired,
/// `403` if its signature does not verify, or `500` if the identity store
/// fails.
pub async fn auth_handler(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<Json<AuthResponse>, StatusCode> {
    let claim = ExternalClaim::from_json(&body).map_err(|e| reject(&e))?;
    sign_in(&state, &claim).await
}

/// Handle `POST /v1/accounts/auth/init-data` — same as [`auth_handler`],
/// with the raw URL-encoded launch string as the body.
///
/// # Errors
///
/// See [`auth_handler`].
pub async fn init_data_handler(
    State(state): State<SharedState>,
    body: String,
) -> Result<Json<AuthResponse>, StatusCode> {
    let claim = ExternalClaim::from_init_data(&body).map_err(|e| reject(&e))?;
    sign_in(&state, &claim).await
}

async fn sign_in(state: &SharedState, claim: &ExternalClaim) -> Result<Json<AuthResponse>, StatusCode> {
    let validated = state
        .validator
        .validate(claim, Utc::now().timestamp())
        .map_err(|e| reject(&e))?;

    let issued = state.issuer.issue(&validated).await.map_err(|e| {
        error!("session issuance failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!(
        "signed in external id {} as {}",
        issued.identity.external_id, issued.identity.subject_id
    );

    Ok(Json(AuthResponse {
        subject_id: issued.identity.subject_id,
        display_name: issued.identity.display_name.map(String::from),
        role: issued.identity.role,
        expires_at: issued.credential.expires_at,
        token: issued.credential.into_token(),
    }))
}
