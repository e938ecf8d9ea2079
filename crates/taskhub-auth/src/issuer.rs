//! Identity resolution and session minting for validated claims.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use taskhub_core::identity::SessionIdentity;
use taskhub_core::types::Role;

use crate::error::{IssueError, StoreError};
use crate::session::{SessionCredential, SessionSigner};
use crate::store::{IdentityStore, Provisioned};
use crate::validator::ValidatedClaim;

/// Default bound on a single identity-store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// The outcome of a successful issuance.
#[derive(Debug, Clone)]
pub struct Issued {
    /// The resolved or newly provisioned identity.
    pub identity: SessionIdentity,
    /// The credential bound to `identity.subject_id`.
    pub credential: SessionCredential,
    /// Whether this issuance inserted the identity.
    pub created: bool,
}

/// Resolves or provisions identities and mints their session credentials.
pub struct SessionIssuer {
    store: Arc<dyn IdentityStore>,
    signer: SessionSigner,
    default_role: Role,
    store_timeout: Duration,
}

impl SessionIssuer {
    /// Build an issuer over `store`, signing with `signer`.
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, signer: SessionSigner) -> Self {
        Self {
            store,
            signer,
            default_role: Role::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Role assigned to newly provisioned identities.
    #[must_use]
    pub fn with_default_role(mut self, role: Role) -> Self {
        self.default_role = role;
        self
    }

    /// Bound on each identity-store round trip.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// The signer, for checking credentials presented later.
    #[must_use]
    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    /// Issue a credential for `claim` against the current clock.
    ///
    /// # Errors
    ///
    /// See [`SessionIssuer::issue_at`].
    pub async fn issue(&self, claim: &ValidatedClaim) -> Result<Issued, IssueError> {
        self.issue_at(claim, Utc::now().timestamp()).await
    }

    /// Resolve the identity for `claim`, provisioning it on first sight,
    /// and mint a credential valid from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError`] if the identity store fails or times out, or
    /// the credential cannot be signed. Nothing is retried.
    pub async fn issue_at(&self, claim: &ValidatedClaim, now: i64) -> Result<Issued, IssueError> {
        let external_id = claim.external_id();
        let (identity, created) = match self
            .bounded(self.store.find_by_external_id(external_id))
            .await?
        {
            Some(identity) => (identity, false),
            None => {
                let Provisioned { identity, created } = self
                    .bounded(self.store.create_identity(
                        external_id,
                        claim.display_name(),
                        self.default_role,
                    ))
                    .await?;
                if created {
                    info!(
                        "provisioned identity {} for external id {external_id}",
                        identity.subject_id
                    );
                } else {
                    debug!(
                        "resolved identity {} for external id {external_id} after a concurrent insert",
                        identity.subject_id
                    );
                }
                (identity, created)
            }
        };
        let credential = self.signer.mint(&identity, now)?;
        Ok(Issued {
            identity,
            credential,
            created,
        })
    }

    /// Run one identity-store call under the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Timeout`] if `call` does not finish in time, or
    /// [`IssueError::Store`] if it fails.
    pub async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, IssueError> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| IssueError::Timeout(self.store_timeout.as_millis()))?
            .map_err(IssueError::from)
    }
}
