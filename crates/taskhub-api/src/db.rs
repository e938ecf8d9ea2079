//! Database connection pool initialisation and the `PostgreSQL` identity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use taskhub_auth::error::StoreError;
use taskhub_auth::store::{IdentityStore, Provisioned};
use taskhub_core::identity::SessionIdentity;
use taskhub_core::types::{DisplayName, ExternalId, Role};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during database initialisation.
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLx returned an error connecting or migrating.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    /// Migration error.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Create a connection pool and run pending migrations.
///
/// # Errors
///
/// Returns [`DbError`] if the pool cannot be created or migrations fail.
pub async fn connect_and_migrate(database_url: &str) -> Result<PgPool, DbError> {
    let pool = PgPool::connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    subject_id: Uuid,
    external_id: i64,
    display_name: Option<String>,
    role_id: String,
    balance: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for SessionIdentity {
    type Error = StoreError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            subject_id: row.subject_id,
            external_id: ExternalId::new(row.external_id)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            display_name: row
                .display_name
                .as_deref()
                .map(DisplayName::new)
                .transpose()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            role: row
                .role_id
                .parse::<Role>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            balance: row.balance,
            created_at: row.created_at,
        })
    }
}

fn unavailable(e: &sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// [`IdentityStore`] backed by the `identities` table.
///
/// Uniqueness of `external_id` is enforced by the table constraint; an
/// insert that loses a race is resolved by reading the winner's row.
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_external_id(&self, id: ExternalId) -> Result<Option<SessionIdentity>, StoreError> {
        sqlx::query_as::<_, IdentityRow>(
            "SELECT subject_id, external_id, display_name, role_id, balance, created_at
             FROM identities WHERE external_id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?
        .map(SessionIdentity::try_from)
        .transpose()
    }

    async fn create_identity(
        &self,
        id: ExternalId,
        display_name: Option<&DisplayName>,
        role: Role,
    ) -> Result<Provisioned, StoreError> {
        let inserted = sqlx::query_as::<_, IdentityRow>(
            "INSERT INTO identities (subject_id, external_id, display_name, role_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (external_id) DO NOTHING
             RETURNING subject_id, external_id, display_name, role_id, balance, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(id.get())
        .bind(display_name.map(DisplayName::as_str))
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?;

        if let Some(row) = inserted {
            return Ok(Provisioned {
                identity: SessionIdentity::try_from(row)?,
                created: true,
            });
        }
        // lost the race: the winner's row is authoritative
        let identity = self.find_by_external_id(id).await?.ok_or_else(|| {
            StoreError::Corrupt(format!("identity {id} conflicted but cannot be read"))
        })?;
        Ok(Provisioned {
            identity,
            created: false,
        })
    }

    async fn find_by_subject(&self, subject_id: Uuid) -> Result<Option<SessionIdentity>, StoreError> {
        sqlx::query_as::<_, IdentityRow>(
            "SELECT subject_id, external_id, display_name, role_id, balance, created_at
             FROM identities WHERE subject_id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?
        .map(SessionIdentity::try_from)
        .transpose()
    }

    async fn update_display_name(
        &self,
        subject_id: Uuid,
        display_name: Option<&DisplayName>,
    ) -> Result<Option<SessionIdentity>, StoreError> {
        sqlx::query_as::<_, IdentityRow>(
            "UPDATE identities SET display_name = $2
             WHERE subject_id = $1
             RETURNING subject_id, external_id, display_name, role_id, balance, created_at",
        )
        .bind(subject_id)
        .bind(display_name.map(DisplayName::as_str))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?
        .map(SessionIdentity::try_from)
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role_id: &str, external_id: i64) -> IdentityRow {
        IdentityRow {
            subject_id: Uuid::new_v4(),
            external_id,
            display_name: Some("alice".to_owned()),
            role_id: role_id.to_owned(),
            balance: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn row_maps_onto_identity() {
        let identity = SessionIdentity::try_from(row("manager", 42)).unwrap();
        assert_eq!(identity.role, Role::Manager);
        assert_eq!(identity.external_id.get(), 42);
    }

    #[test]
    fn unknown_role_is_corrupt() {
        assert!(matches!(
            SessionIdentity::try_from(row("admin", 42)),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn stored_display_name_is_validated() {
        let identity = SessionIdentity::try_from(row("executor", 42)).unwrap();
        assert_eq!(identity.display_name.as_ref().map(DisplayName::as_str), Some("alice"));

        let mut blank = row("executor", 42);
        blank.display_name = Some("   ".to_owned());
        assert!(matches!(
            SessionIdentity::try_from(blank),
            Err(StoreError::Corrupt(_))
        ));

        let mut absent = row("executor", 42);
        absent.display_name = None;
        assert!(SessionIdentity::try_from(absent).unwrap().display_name.is_none());
    }

    #[test]
    fn non_positive_external_id_is_corrupt() {
        assert!(matches!(
            SessionIdentity::try_from(row("executor", 0)),
            Err(StoreError::Corrupt(_))
        ));
    }
}
