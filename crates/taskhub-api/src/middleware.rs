//! Auth helpers: extract Bearer token, check the session credential.

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use log::warn;
use taskhub_auth::session::{SessionClaims, SessionSigner};

/// Extract the raw token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn extract_bearer(header: &str) -> Option<String> {
    let token = header.strip_prefix("Bearer ")?;
    if token.is_empty() { None } else { Some(token.to_owned()) }
}

/// Resolve the session principal from request headers.
///
/// Verification is by signature and expiry only; no lookup is made.
///
/// # Errors
///
/// Returns `UNAUTHORIZED` if the header is missing, not a Bearer token, or
/// the credential is invalid or expired.
pub fn authenticate(headers: &HeaderMap, signer: &SessionSigner) -> Result<SessionClaims, StatusCode> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    signer.verify(&token).map_err(|e| {
        warn!("session credential rejected: {e}");
        StatusCode::UNAUTHORIZED
    })
}
