//! Role store contract.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application role. Only `Admin` grants anything.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(StoreError::Backend(format!("unknown role '{other}'"))),
        }
    }
}

/// A persisted grant of a role to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

/// Errors reported by the relational backing stores.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store itself refused the caller.
    #[error("Store rejected the request: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Backend(String),
}

/// Contract of the `(user_id, role)` relation.
///
/// A `(user_id, role)` pair is unique: inserting a grant that already exists
/// fails.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_role(&self, user_id: &str, role: Role)
    -> Result<Option<RoleAssignment>, StoreError>;

    async fn insert_role(&self, user_id: &str, role: Role) -> Result<RoleAssignment, StoreError>;
}
