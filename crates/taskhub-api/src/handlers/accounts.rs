//! GET/PUT /v1/accounts/me — the signed-in identity's profile.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use log::error;
use taskhub_auth::error::IssueError;
use taskhub_core::types::DisplayName;

use crate::middleware::authenticate;
use crate::models::{ProfileResponse, UpdateProfileRequest};
use crate::router::SharedState;

fn internal(err: &IssueError) -> StatusCode {
    error!("identity store: {err}");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Handle `GET /v1/accounts/me`.
///
/// # Errors
///
/// Returns `401` without a valid session, `404` if the identity no longer
/// exists, or `500` on a store failure.
pub async fn me_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, StatusCode> {
    let session = authenticate(&headers, state.issuer.signer())?;
    let identity = state
        .issuer
        .bounded(state.store.find_by_subject(session.sub))
        .await
        .map_err(|e| internal(&e))?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(identity.into()))
}

/// Handle `PUT /v1/accounts/me` — replace the display name.
///
/// # Errors
///
/// Returns `401` without a valid session, `422` if the name is blank or too
/// long, `404` if the identity no longer exists, or `500` on a store failure.
pub async fn update_me_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, StatusCode> {
    let session = authenticate(&headers, state.issuer.signer())?;
    let name = DisplayName::new(&body.display_name).map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;
    let identity = state
        .issuer
        .bounded(state.store.update_display_name(session.sub, Some(&name)))
        .await
        .map_err(|e| internal(&e))?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(identity.into()))
}
