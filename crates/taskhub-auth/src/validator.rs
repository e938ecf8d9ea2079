//! Freshness, presence and signature checks on an external claim.

use std::collections::BTreeMap;

use log::debug;
use taskhub_core::types::{DisplayName, ExternalId};

use crate::canonical::{join, Canonicalizer};
use crate::claim::ExternalClaim;
use crate::error::{ClaimError, VerifyError};
use crate::verifier::SignatureVerifier;

/// Freshness window for `auth_date`, in seconds.
pub const MAX_CLAIM_AGE_SECS: i64 = 86_400;

const ID_FIELD: &str = "id";
const USERNAME_FIELD: &str = "username";
const FIRST_NAME_FIELD: &str = "first_name";
const LAST_NAME_FIELD: &str = "last_name";

/// A claim that passed every check. The only value usable downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaim {
    external_id: ExternalId,
    display_name: Option<DisplayName>,
    issued_at: i64,
}

impl ValidatedClaim {
    /// The stable identifier asserted by the provider.
    #[must_use]
    pub fn external_id(&self) -> ExternalId {
        self.external_id
    }

    /// The display name carried by the claim, if any.
    #[must_use]
    pub fn display_name(&self) -> Option<&DisplayName> {
        self.display_name.as_ref()
    }

    /// The claim's `auth_date`.
    #[must_use]
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }
}

/// Pure, synchronous claim validation.
#[derive(Debug, Clone)]
pub struct ClaimValidator {
    canonicalizer: Canonicalizer,
    verifier: SignatureVerifier,
    max_age: i64,
}

impl ClaimValidator {
    /// Validate with the default canonicalization policy and a 24 h window.
    #[must_use]
    pub fn new(verifier: SignatureVerifier) -> Self {
        Self {
            canonicalizer: Canonicalizer::default(),
            verifier,
            max_age: MAX_CLAIM_AGE_SECS,
        }
    }

    /// Build a validator straight from the shared bot credential.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MissingKey`] if `shared_secret` is empty.
    pub fn from_secret(shared_secret: &[u8]) -> Result<Self, VerifyError> {
        Ok(Self::new(SignatureVerifier::new(shared_secret)?))
    }

    /// Replace the canonicalization policy.
    #[must_use]
    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Replace the freshness window.
    #[must_use]
    pub fn with_max_age(mut self, max_age_secs: i64) -> Self {
        self.max_age = max_age_secs;
        self
    }

    /// Validate `claim` as of Unix time `now`.
    ///
    /// Expiry is checked before the signature, so a stale but correctly
    /// signed claim fails with [`ClaimError::Expired`].
    ///
    /// # Errors
    ///
    /// [`ClaimError::Malformed`] when `auth_date`, `hash` or the user id is
    /// missing; [`ClaimError::Expired`] when `now - auth_date > max_age`;
    /// [`ClaimError::SignatureMismatch`] when the signature does not verify.
    pub fn validate(&self, claim: &ExternalClaim, now: i64) -> Result<ValidatedClaim, ClaimError> {
        let issued_at = claim
            .issued_at()
            .ok_or_else(|| ClaimError::Malformed("missing or non-numeric auth_date".to_owned()))?;
        let asserted = claim
            .asserted_signature()
            .ok_or_else(|| ClaimError::Malformed("missing hash".to_owned()))?;

        let age = now.saturating_sub(issued_at);
        if age > self.max_age {
            return Err(ClaimError::Expired {
                age,
                max_age: self.max_age,
            });
        }

        let normalized = self.canonicalizer.normalize(claim.fields());
        if !self.verifier.verify(&join(&normalized), asserted) {
            return Err(ClaimError::SignatureMismatch);
        }

        let external_id = normalized
            .get(ID_FIELD)
            .and_then(|raw| raw.parse::<ExternalId>().ok())
            .ok_or_else(|| ClaimError::Malformed("missing or invalid user id".to_owned()))?;
        debug!("claim for external id {external_id} verified");

        Ok(ValidatedClaim {
            external_id,
            display_name: display_name(&normalized),
            issued_at,
        })
    }
}

fn display_name(normalized: &BTreeMap<String, String>) -> Option<DisplayName> {
    if let Some(name) = normalized
        .get(USERNAME_FIELD)
        .and_then(|username| DisplayName::truncated(username.as_str()))
    {
        return Some(name);
    }
    let parts: Vec<&str> = [FIRST_NAME_FIELD, LAST_NAME_FIELD]
        .iter()
        .filter_map(|key| normalized.get(*key).map(String::as_str))
        .collect();
    DisplayName::truncated(&parts.join(" "))
}
