//! Admin login: credential exchange followed by the gate's role check.

use thiserror::Error;
use tracing::{info, warn};

use super::gate::SessionGate;
use super::identity::{IdentityError, Session};

/// Admin login failures. None of them leave a session behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Provider rejected the credentials; carries the provider's message.
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Admin privileges required")]
    AccessDenied,

    #[error("Something went wrong. Please try again.")]
    Unavailable,
}

impl SessionGate {
    /// Exchange `(email, password)` for an admin session.
    ///
    /// The role check runs only after the provider has issued a session. A
    /// session that fails the role check is signed out before returning.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, LoginError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(LoginError::MissingField("email"));
        }
        if password.is_empty() {
            return Err(LoginError::MissingField("password"));
        }

        let session = match self.identity.verify_credentials(email, password).await {
            Ok(session) => session,
            Err(IdentityError::InvalidCredentials(msg)) => {
                return Err(LoginError::InvalidCredentials(msg));
            }
            Err(e) => {
                warn!(error = %e, "credential verification failed");
                return Err(LoginError::Unavailable);
            }
        };

        let ctx = session.context();
        match self.is_admin(&session.identity.id).await {
            Ok(true) => {
                info!(user_id = %session.identity.id, "admin signed in");
                Ok(session)
            }
            Ok(false) => {
                info!(user_id = %session.identity.id, "sign-in without admin role rejected");
                self.force_sign_out(&ctx).await;
                Err(LoginError::AccessDenied)
            }
            Err(e) => {
                warn!(error = %e, user_id = %session.identity.id, "role lookup failed during login");
                self.force_sign_out(&ctx).await;
                Err(LoginError::Unavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::gate::GateDecision;
    use crate::auth::identity::{IdentityProvider, SessionContext};
    use crate::auth::roles::{Role, RoleAssignment, RoleStore, StoreError};
    use crate::memory::MemoryBackend;

    const EMAIL: &str = "admin@example.com";
    const PASSWORD: &str = "Sup3rSecret!";

    fn gate_for(backend: &MemoryBackend) -> SessionGate {
        SessionGate::new(Arc::new(backend.clone()), Arc::new(backend.clone()))
    }

    struct FlakyRoles;

    #[async_trait]
    impl RoleStore for FlakyRoles {
        async fn find_role(
            &self,
            _user_id: &str,
            _role: Role,
        ) -> Result<Option<RoleAssignment>, StoreError> {
            Err(StoreError::Backend("timeout".into()))
        }

        async fn insert_role(&self, _user_id: &str, _role: Role) -> Result<RoleAssignment, StoreError> {
            Err(StoreError::Backend("timeout".into()))
        }
    }

    #[tokio::test]
    async fn admin_login_yields_authorized_session() {
        let backend = MemoryBackend::new();
        let admin = backend.seed_identity(EMAIL, PASSWORD, &[Role::Admin]).await.unwrap();
        let gate = gate_for(&backend);

        let session = gate.login(EMAIL, PASSWORD).await.unwrap();

        assert_eq!(session.identity, admin);
        assert_eq!(
            gate.check(&session.context()).await,
            GateDecision::Authorized(admin)
        );
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let backend = MemoryBackend::new();
        backend.seed_identity(EMAIL, PASSWORD, &[Role::Admin]).await.unwrap();
        let gate = gate_for(&backend);

        let err = gate.login(EMAIL, "wrong").await.unwrap_err();

        assert!(matches!(err, LoginError::InvalidCredentials(_)));
        assert_eq!(backend.live_session_count().await, 0);
    }

    #[tokio::test]
    async fn non_admin_login_is_denied_and_leaves_no_session() {
        let backend = MemoryBackend::new();
        backend.seed_identity("student@example.com", "pw-123456", &[Role::User]).await.unwrap();
        let gate = gate_for(&backend);

        let err = gate.login("student@example.com", "pw-123456").await.unwrap_err();

        assert_eq!(err, LoginError::AccessDenied);
        assert_eq!(backend.live_session_count().await, 0);
        let student = backend.identity_by_email("student@example.com").await.unwrap();
        assert!(backend.find_role(&student.id, Role::Admin).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn denied_and_invalid_messages_differ() {
        let denied = LoginError::AccessDenied.to_string();
        let invalid = LoginError::InvalidCredentials("Invalid login credentials".into()).to_string();
        assert_ne!(denied, invalid);
        assert!(denied.contains("Admin privileges required"));
    }

    #[tokio::test]
    async fn missing_fields_fail_before_provider_call() {
        let backend = MemoryBackend::new();
        let gate = gate_for(&backend);

        assert_eq!(gate.login("  ", PASSWORD).await, Err(LoginError::MissingField("email")));
        assert_eq!(gate.login(EMAIL, "").await, Err(LoginError::MissingField("password")));
    }

    #[tokio::test]
    async fn role_store_failure_during_login_signs_out() {
        let backend = MemoryBackend::new();
        backend.seed_identity(EMAIL, PASSWORD, &[Role::Admin]).await.unwrap();
        let gate = SessionGate::new(Arc::new(backend.clone()), Arc::new(FlakyRoles));

        let err = gate.login(EMAIL, PASSWORD).await.unwrap_err();

        assert_eq!(err, LoginError::Unavailable);
        assert_eq!(backend.live_session_count().await, 0);
    }

    #[tokio::test]
    async fn repeated_login_after_failure_is_safe() {
        let backend = MemoryBackend::new();
        backend.seed_identity(EMAIL, PASSWORD, &[Role::Admin]).await.unwrap();
        let gate = gate_for(&backend);

        for _ in 0..3 {
            assert!(gate.login(EMAIL, "wrong").await.is_err());
        }
        let session = gate.login(EMAIL, PASSWORD).await.unwrap();
        assert!(backend.current_session(&session.context()).await.unwrap().is_some());
        assert!(
            backend
                .current_session(&SessionContext::anonymous())
                .await
                .unwrap()
                .is_none()
        );
    }
}
