//! Per-user Google credential, stored on the `users` row.
//!
//! The refresh token is sticky: a `put` without one (or with a blank one)
//! rotates the access token and leaves the stored refresh token alone. Only
//! `clear` removes it.

use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use tracing::debug;

use crate::BoxFuture;

#[derive(Clone, PartialEq, Eq)]
pub struct ExternalCredential {
    pub owner_id: i64,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for ExternalCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalCredential")
            .field("owner_id", &self.owner_id)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no user with id {0}")]
    UnknownOwner(i64),

    #[error("credential store query failed: {0}")]
    Database(#[from] sqlx::Error),
}

pub trait CredentialStore: Send + Sync {
    fn get(&self, owner_id: i64) -> BoxFuture<'_, Result<Option<ExternalCredential>, StoreError>>;

    /// Store a new access token. A `None` or blank `refresh_token` keeps the
    /// one already stored.
    fn put<'a>(
        &'a self,
        owner_id: i64,
        access_token: &'a str,
        refresh_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Replace only the access token, and only while a refresh token is
    /// still stored. `false` means the user disconnected in the meantime and
    /// nothing was written.
    fn rotate_access<'a>(
        &'a self,
        owner_id: i64,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>>;

    /// Forget both tokens.
    fn clear(&self, owner_id: i64) -> BoxFuture<'_, Result<(), StoreError>>;
}

#[derive(FromRow)]
struct CredentialRow {
    id: i64,
    google_access_token: Option<String>,
    google_refresh_token: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, owner_id: i64) -> BoxFuture<'_, Result<Option<ExternalCredential>, StoreError>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, CredentialRow>(
                "SELECT id, google_access_token, google_refresh_token FROM users WHERE id = ?1",
            )
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };

            Ok(non_blank(row.google_access_token).map(|access_token| ExternalCredential {
                owner_id: row.id,
                access_token,
                refresh_token: non_blank(row.google_refresh_token),
            }))
        })
    }

    fn put<'a>(
        &'a self,
        owner_id: i64,
        access_token: &'a str,
        refresh_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            // One statement, so a concurrent put for the same owner is
            // last-write-wins and never a torn pair.
            let result = sqlx::query(
                "UPDATE users
                 SET google_access_token  = ?1,
                     google_refresh_token = COALESCE(NULLIF(TRIM(?2), ''), google_refresh_token)
                 WHERE id = ?3",
            )
            .bind(access_token)
            .bind(refresh_token)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::UnknownOwner(owner_id));
            }

            debug!(
                "Stored Google credential for user {} (refresh token {})",
                owner_id,
                if refresh_token.is_some_and(|r| !r.trim().is_empty()) {
                    "replaced"
                } else {
                    "kept"
                }
            );
            Ok(())
        })
    }

    fn rotate_access<'a>(
        &'a self,
        owner_id: i64,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE users SET google_access_token = ?1
                 WHERE id = ?2 AND TRIM(COALESCE(google_refresh_token, '')) <> ''",
            )
            .bind(access_token)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                return Ok(true);
            }

            let exists = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;
            match exists {
                Some(_) => {
                    debug!("User {} has no refresh token; access token not rotated", owner_id);
                    Ok(false)
                }
                None => Err(StoreError::UnknownOwner(owner_id)),
            }
        })
    }

    fn clear(&self, owner_id: i64) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE users SET google_access_token = NULL, google_refresh_token = NULL
                 WHERE id = ?1",
            )
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::UnknownOwner(owner_id));
            }
            Ok(())
        })
    }
}
