//! Identity provider contract.
//!
//! Credential verification, session issuance and identity creation are owned
//! by the hosted identity provider. The core only talks to it through
//! [`IdentityProvider`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A principal recognised by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRef {
    pub id: String,
    pub email: String,
}

/// Provider-issued proof that requests originate from an authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer token.
    pub access_token: String,
    pub identity: IdentityRef,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Context that carries this session's token into later calls.
    pub fn context(&self) -> SessionContext {
        SessionContext::bearer(self.access_token.clone())
    }
}

/// The caller's session, passed explicitly into every protected call.
///
/// Holds only the bearer token the caller presented. Whether it still names a
/// live session is always answered by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    access_token: Option<String>,
}

impl SessionContext {
    /// A context with no session at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context presenting the given bearer token. Blank tokens are ignored.
    pub fn bearer(token: impl Into<String>) -> Self {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            Self::anonymous()
        } else {
            Self {
                access_token: Some(token.to_string()),
            }
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.access_token.is_none()
    }
}

/// Identity provider errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    AlreadyRegistered(String),

    #[error("Identity provider not configured: {0}")]
    NotConfigured(String),

    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Contract of the external identity provider client.
///
/// `current_session` and `sign_out` act on the session named by the given
/// context. `create_identity` and `list_identities` need service-level
/// credentials and are only reachable from trusted server code.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for a new session.
    async fn verify_credentials(&self, email: &str, password: &str)
    -> Result<Session, IdentityError>;

    /// Resolve the live session named by `ctx`, if any.
    async fn current_session(&self, ctx: &SessionContext)
    -> Result<Option<Session>, IdentityError>;

    /// End the session named by `ctx`. Signing out twice is not an error.
    async fn sign_out(&self, ctx: &SessionContext) -> Result<(), IdentityError>;

    /// Create an identity. Fails with `AlreadyRegistered` when the email is taken.
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        preconfirmed: bool,
    ) -> Result<IdentityRef, IdentityError>;

    /// List every identity known to the provider.
    async fn list_identities(&self) -> Result<Vec<IdentityRef>, IdentityError>;
}
