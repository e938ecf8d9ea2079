//! The identity-provisioning seam.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use taskhub_core::identity::SessionIdentity;
use taskhub_core::types::{DisplayName, ExternalId, Role};
use uuid::Uuid;

use crate::error::StoreError;

/// The row returned by [`IdentityStore::create_identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// The stored identity.
    pub identity: SessionIdentity,
    /// `true` when this call inserted the row, `false` when it already existed.
    pub created: bool,
}

/// Persistent storage of [`SessionIdentity`] rows.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up an identity by its external identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be queried.
    async fn find_by_external_id(&self, id: ExternalId) -> Result<Option<SessionIdentity>, StoreError>;

    /// Create the identity for `id`, or return the existing one.
    ///
    /// Must be safe under concurrent calls for the same `id`: exactly one
    /// row is created, every caller gets that row back, and only the
    /// inserting caller sees `created == true`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    async fn create_identity(
        &self,
        id: ExternalId,
        display_name: Option<&DisplayName>,
        role: Role,
    ) -> Result<Provisioned, StoreError>;

    /// Look up an identity by its durable key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be queried.
    async fn find_by_subject(&self, subject_id: Uuid) -> Result<Option<SessionIdentity>, StoreError>;

    /// Replace the display name, returning the updated row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    async fn update_display_name(
        &self,
        subject_id: Uuid,
        display_name: Option<&DisplayName>,
    ) -> Result<Option<SessionIdentity>, StoreError>;
}

/// An in-memory [`IdentityStore`] for use in tests and offline scenarios.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    rows: Mutex<HashMap<ExternalId, SessionIdentity>>,
}

impl InMemoryIdentityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identities.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.rows()?.len())
    }

    /// Whether the store is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.rows()?.is_empty())
    }

    fn rows(&self) -> Result<MutexGuard<'_, HashMap<ExternalId, SessionIdentity>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable("identity map lock poisoned".to_owned()))
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_external_id(&self, id: ExternalId) -> Result<Option<SessionIdentity>, StoreError> {
        Ok(self.rows()?.get(&id).cloned())
    }

    async fn create_identity(
        &self,
        id: ExternalId,
        display_name: Option<&DisplayName>,
        role: Role,
    ) -> Result<Provisioned, StoreError> {
        let mut rows = self.rows()?;
        let provisioned = match rows.entry(id) {
            Entry::Occupied(row) => Provisioned {
                identity: row.get().clone(),
                created: false,
            },
            Entry::Vacant(slot) => {
                let identity = SessionIdentity::provision(id, display_name.cloned(), role);
                Provisioned {
                    identity: slot.insert(identity).clone(),
                    created: true,
                }
            }
        };
        Ok(provisioned)
    }

    async fn find_by_subject(&self, subject_id: Uuid) -> Result<Option<SessionIdentity>, StoreError> {
        Ok(self
            .rows()?
            .values()
            .find(|row| row.subject_id == subject_id)
            .cloned())
    }

    async fn update_display_name(
        &self,
        subject_id: Uuid,
        display_name: Option<&DisplayName>,
    ) -> Result<Option<SessionIdentity>, StoreError> {
        let mut rows = self.rows()?;
        let Some(row) = rows.values_mut().find(|row| row.subject_id == subject_id) else {
            return Ok(None);
        };
        row.display_name = display_name.cloned();
        Ok(Some(row.clone()))
    }
}
