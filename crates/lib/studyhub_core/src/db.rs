//! Direct Postgres access for deployments that own their database.
//!
//! Provides a pool constructor and [`PgRoleStore`], a [`RoleStore`] over the
//! `user_roles` table created by the embedded migrations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::auth::{Role, RoleAssignment, RoleStore, StoreError};

/// Maximum time to wait for a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Open a connection pool to `database_url`.
pub async fn connect(database_url: &str) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// [`RoleStore`] backed by a Postgres pool.
#[derive(Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type RoleRow = (String, String, String, Option<DateTime<Utc>>);

fn assignment((id, user_id, role, created_at): RoleRow) -> Result<RoleAssignment, StoreError> {
    Ok(RoleAssignment {
        id,
        user_id,
        role: role.parse()?,
        created_at,
    })
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn find_role(&self, user_id: &str, role: Role) -> Result<Option<RoleAssignment>, StoreError> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id::text, user_id::text, role::text, created_at \
             FROM user_roles WHERE user_id = $1::uuid AND role = $2::app_role LIMIT 1",
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(assignment).transpose()
    }

    async fn insert_role(&self, user_id: &str, role: Role) -> Result<RoleAssignment, StoreError> {
        let row = sqlx::query_as::<_, RoleRow>(
            "INSERT INTO user_roles (user_id, role) VALUES ($1::uuid, $2::app_role) \
             RETURNING id::text, user_id::text, role::text, created_at",
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        assignment(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_text_is_a_store_error() {
        let err = assignment(("r".into(), "u".into(), "owner".into(), None)).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn role_text_maps_to_enum() {
        let row = assignment(("r".into(), "u".into(), "admin".into(), None)).unwrap();
        assert_eq!(row.role, Role::Admin);
    }
}
