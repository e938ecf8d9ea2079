//! Error types for claim verification and session issuance.

use thiserror::Error;

/// Errors raised by the keyed-hash primitives.
///
/// A signature that simply does not match is not an error; see
/// [`crate::verifier::verify`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// The shared secret is empty.
    #[error("missing key material")]
    MissingKey,
    /// The keyed-hash primitive refused the key.
    #[error("invalid key length")]
    InvalidKeyLength,
}

/// Why an external claim was rejected.
///
/// Every variant is client-caused and must not be retried. None of them
/// carry the canonical string or any key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimError {
    /// A required field is absent or unparseable.
    #[error("malformed claim: {0}")]
    Malformed(String),
    /// The claim was issued outside the freshness window.
    #[error("claim expired: issued {age}s ago, limit {max_age}s")]
    Expired {
        /// Seconds elapsed since `auth_date`.
        age: i64,
        /// The freshness window in seconds.
        max_age: i64,
    },
    /// The canonical string does not hash to the asserted signature.
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Errors minting or checking a session credential.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session-signing secret is empty.
    #[error("missing session signing key")]
    MissingKey,
    /// The credential has passed its `exp`.
    #[error("session credential expired")]
    Expired,
    /// The credential is malformed or its signature does not verify.
    #[error("invalid session credential: {0}")]
    Invalid(jsonwebtoken::errors::Error),
    /// The credential could not be encoded.
    #[error("failed to encode session credential: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

/// Errors reported by an identity store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or returned an error.
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
    /// A stored row could not be mapped onto a domain value.
    #[error("corrupt identity row: {0}")]
    Corrupt(String),
}

/// Errors surfaced by [`crate::issuer::SessionIssuer::issue`].
///
/// All variants are infrastructure failures; they are fatal to the request
/// and never retried inside the issuer.
#[derive(Debug, Error)]
pub enum IssueError {
    /// The identity store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The identity store did not answer within the configured timeout.
    #[error("identity store timed out after {0} ms")]
    Timeout(u128),
    /// The credential could not be signed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
