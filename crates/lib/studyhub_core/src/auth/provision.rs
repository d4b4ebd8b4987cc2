//! Admin provisioning: idempotently ensure an identity exists and holds the
//! admin role.
//!
//! Runs with service-level credentials only. Two concurrent calls for the
//! same new email rely on the provider's own email uniqueness: the loser gets
//! `AlreadyRegistered` and resolves the winner's identity by lookup. The role
//! grant relies on the store's `(user_id, role)` uniqueness the same way: a
//! failed insert is re-checked, and a grant written by the other call counts
//! as `AlreadyAdmin`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use super::identity::{IdentityError, IdentityProvider, IdentityRef};
use super::roles::{Role, RoleStore};

/// Result of a successful provisioning call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProvisionStatus {
    /// The admin role was written by this call.
    RoleGranted,
    /// The identity already held the admin role; nothing was written.
    AlreadyAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub status: ProvisionStatus,
    pub identity: IdentityRef,
}

impl ProvisionOutcome {
    pub fn message(&self) -> &'static str {
        match self.status {
            ProvisionStatus::RoleGranted => "Admin user created successfully",
            ProvisionStatus::AlreadyAdmin => "User already has admin role",
        }
    }
}

/// Provisioning failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// Missing input; nothing was attempted.
    #[error("{0}")]
    BadRequest(String),

    /// Provider reports the email as registered but no identity carries it.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Provider(String),

    /// The identity exists but the admin grant did not happen. Retrying the
    /// whole call is safe.
    #[error("{reason}")]
    PartialFailure { identity: IdentityRef, reason: String },
}

/// One-shot admin provisioning service.
#[derive(Clone)]
pub struct AdminProvisioner {
    identity: Arc<dyn IdentityProvider>,
    roles: Arc<dyn RoleStore>,
}

impl AdminProvisioner {
    pub fn new(identity: Arc<dyn IdentityProvider>, roles: Arc<dyn RoleStore>) -> Self {
        Self { identity, roles }
    }

    /// Ensure `email` names an identity holding the admin role.
    pub async fn provision(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ProvisionError::BadRequest(
                "Email and password are required".into(),
            ));
        }

        let identity = self.resolve_identity(email, password).await?;

        match self.roles.find_role(&identity.id, Role::Admin).await {
            Ok(Some(_)) => {
                info!(user_id = %identity.id, "identity already holds admin role");
                return Ok(ProvisionOutcome {
                    status: ProvisionStatus::AlreadyAdmin,
                    identity,
                });
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, user_id = %identity.id, "admin role lookup failed");
                return Err(ProvisionError::PartialFailure {
                    identity,
                    reason: "User created but admin role could not be verified".into(),
                });
            }
        }

        if let Err(e) = self.roles.insert_role(&identity.id, Role::Admin).await {
            // A concurrent call may have written the same grant first.
            if let Ok(Some(_)) = self.roles.find_role(&identity.id, Role::Admin).await {
                info!(user_id = %identity.id, "admin role granted concurrently");
                return Ok(ProvisionOutcome {
                    status: ProvisionStatus::AlreadyAdmin,
                    identity,
                });
            }
            error!(error = %e, user_id = %identity.id, "admin role grant failed");
            return Err(ProvisionError::PartialFailure {
                identity,
                reason: "User created but failed to assign admin role".into(),
            });
        }

        info!(user_id = %identity.id, "admin role granted");
        Ok(ProvisionOutcome {
            status: ProvisionStatus::RoleGranted,
            identity,
        })
    }

    /// Create the identity, or find the existing one on `AlreadyRegistered`.
    async fn resolve_identity(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityRef, ProvisionError> {
        match self.identity.create_identity(email, password, true).await {
            Ok(identity) => {
                info!(user_id = %identity.id, "identity created");
                Ok(identity)
            }
            Err(IdentityError::AlreadyRegistered(_)) => {
                info!("identity already registered, looking it up");
                let identities = self.identity.list_identities().await.map_err(|e| {
                    warn!(error = %e, "identity listing failed");
                    ProvisionError::Provider("User exists but could not verify identity".into())
                })?;
                identities
                    .into_iter()
                    .find(|candidate| candidate.email.eq_ignore_ascii_case(email))
                    .ok_or_else(|| {
                        ProvisionError::Conflict("User exists but could not be found".into())
                    })
            }
            Err(e) => {
                warn!(error = %e, "identity creation failed");
                Err(ProvisionError::Provider(e.to_string()))
            }
        }
    }
}
