//! The durable principal created on first successful sign-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DisplayName, ExternalId, Role};

/// A local identity bound to one external identifier.
///
/// Created at most once per [`ExternalId`] and never deleted by the
/// authentication layer. `balance` is owned by the task-lifecycle store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Durable local key; the `sub` of every session credential.
    pub subject_id: Uuid,
    /// Immutable identifier asserted by the external provider.
    pub external_id: ExternalId,
    /// Optional, mutable display name.
    pub display_name: Option<DisplayName>,
    /// Role assigned at creation.
    pub role: Role,
    /// Balance in minor currency units.
    pub balance: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl SessionIdentity {
    /// Build a fresh identity with a random subject key and zero balance.
    #[must_use]
    pub fn provision(external_id: ExternalId, display_name: Option<DisplayName>, role: Role) -> Self {
        Self {
            subject_id: Uuid::new_v4(),
            external_id,
            display_name,
            role,
            balance: 0,
            created_at: Utc::now(),
        }
    }
}
