//! Stateless session credentials (HS256 JWT).
//!
//! A credential is verified by signature and expiry alone; no record of
//! issued credentials is kept.

use std::fmt;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use taskhub_core::identity::SessionIdentity;
use taskhub_core::types::Role;
use uuid::Uuid;

use crate::error::SessionError;

/// Session validity window, in seconds.
pub const SESSION_TTL_SECS: i64 = 86_400;

/// Claims embedded in every session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The identity's durable key.
    pub sub: Uuid,
    /// The external identifier the identity is bound to.
    pub ext: i64,
    /// Role at issuance.
    pub role: Role,
    /// Issued-at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
}

/// A minted credential. Ownership passes entirely to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    /// The identity this credential is bound to.
    pub subject_id: Uuid,
    /// Expiry (Unix seconds).
    pub expires_at: i64,
    token: String,
}

impl SessionCredential {
    /// The signed bearer token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Consume the credential, returning the bearer token.
    #[must_use]
    pub fn into_token(self) -> String {
        self.token
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("subject_id", &self.subject_id)
            .field("expires_at", &self.expires_at)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Mints and checks session credentials with the server-held secret.
#[derive(Clone)]
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: i64,
}

impl SessionSigner {
    /// Build a signer with the default 24 h validity window.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingKey`] if `secret` is empty.
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::MissingKey);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: SESSION_TTL_SECS,
        })
    }

    /// Replace the validity window.
    #[must_use]
    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl = ttl_secs;
        self
    }

    /// Mint a credential for `identity`, valid until `now + ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Encode`] if the token cannot be encoded.
    pub fn mint(
        &self,
        identity: &SessionIdentity,
        now: i64,
    ) -> Result<SessionCredential, SessionError> {
        let claims = SessionClaims {
            sub: identity.subject_id,
            ext: identity.external_id.get(),
            role: identity.role,
            iat: now,
            exp: now + self.ttl,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(SessionError::Encode)?;
        Ok(SessionCredential {
            subject_id: claims.sub,
            expires_at: claims.exp,
            token,
        })
    }

    /// Check `token` against the current clock.
    ///
    /// # Errors
    ///
    /// See [`SessionSigner::verify_at`].
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Check signature and expiry of `token` as of Unix time `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Invalid`] if the token is malformed or the
    /// signature does not verify, [`SessionError::Expired`] if `now` is past
    /// its `exp`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        let claims = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(SessionError::Invalid)?
            .claims;
        if now > claims.exp {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }
}

impl fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
