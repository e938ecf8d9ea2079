//! Launch-payload verification and session issuance for taskhub.
//!
//! The flow is: raw claim → [`validator::ClaimValidator`] →
//! [`verifier::SignatureVerifier`] (over [`canonical::Canonicalizer`]
//! output) → [`issuer::SessionIssuer`] → signed session credential.
#![deny(warnings, clippy::all, clippy::pedantic)]
#![warn(missing_docs)]

pub mod canonical;
pub mod claim;
pub mod error;
pub mod issuer;
pub mod session;
pub mod store;
pub mod validator;
pub mod verifier;
