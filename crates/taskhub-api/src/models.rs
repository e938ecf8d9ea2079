//! API request and response models.

use serde::{Deserialize, Serialize};
use taskhub_core::identity::SessionIdentity;
use taskhub_core::types::Role;
use uuid::Uuid;

/// Response body for a successful sign-in.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Durable key of the signed-in identity.
    pub subject_id: Uuid,
    /// Display name on record.
    pub display_name: Option<String>,
    /// Role on record.
    pub role: Role,
    /// Bearer token for subsequent requests.
    pub token: String,
    /// Token expiry (Unix seconds).
    pub expires_at: i64,
}

/// Response body for `GET /v1/accounts/me`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    /// Durable key.
    pub subject_id: Uuid,
    /// Identifier asserted by the external provider.
    pub external_id: i64,
    /// Display name on record.
    pub display_name: Option<String>,
    /// Role on record.
    pub role: Role,
    /// Balance in minor currency units.
    pub balance: i64,
}

impl From<SessionIdentity> for ProfileResponse {
    fn from(identity: SessionIdentity) -> Self {
        Self {
            subject_id: identity.subject_id,
            external_id: identity.external_id.get(),
            display_name: identity.display_name.map(String::from),
            role: identity.role,
            balance: identity.balance,
        }
    }
}

/// Request body for `PUT /v1/accounts/me`.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    /// New display name.
    pub display_name: String,
}
