//! Session gate: decides whether a caller may reach the admin area.
//!
//! ```text
//! start ──► current_session ──► none ─────────────────────► Unauthenticated
//!                 │
//!                 └─► some ──► find_role(admin) ──► row ───► Authorized
//!                                     │
//!                                     └─► none ──► sign_out ► Unauthorized
//! ```
//!
//! Any provider or store failure yields `Unauthenticated` with an
//! [`GateNotice::Unavailable`] notice. Role membership is never cached: a
//! revoked role takes effect on the next check.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ADMIN_LOGIN_PATH;
use super::identity::{IdentityProvider, IdentityRef, SessionContext};
use super::roles::{Role, RoleStore, StoreError};

/// User-facing notice attached to a non-authorized decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GateNotice {
    /// Provider or store failure. Never carries internal detail.
    Unavailable,
    /// A previously authorized session is no longer valid.
    SessionExpired,
    /// Valid session without the admin role; the session was cleared.
    AccessDenied,
}

impl GateNotice {
    pub fn message(&self) -> &'static str {
        match self {
            GateNotice::Unavailable => "Something went wrong. Please try again.",
            GateNotice::SessionExpired => "Your session has expired. Please sign in again.",
            GateNotice::AccessDenied => "Admin privileges required.",
        }
    }
}

/// Verdict for one protected request. Derived per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Authorized(IdentityRef),
    Unauthenticated(Option<GateNotice>),
    /// Authenticated without the admin role. The session has been signed out.
    Unauthorized,
}

impl GateDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, GateDecision::Authorized(_))
    }

    pub fn identity(&self) -> Option<&IdentityRef> {
        match self {
            GateDecision::Authorized(identity) => Some(identity),
            _ => None,
        }
    }

    /// Where the caller must be sent instead of the protected view.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            GateDecision::Authorized(_) => None,
            _ => Some(ADMIN_LOGIN_PATH),
        }
    }

    pub fn notice(&self) -> Option<GateNotice> {
        match self {
            GateDecision::Authorized(_) => None,
            GateDecision::Unauthenticated(notice) => *notice,
            GateDecision::Unauthorized => Some(GateNotice::AccessDenied),
        }
    }
}

/// Composes identity provider session state with a role store lookup.
#[derive(Clone)]
pub struct SessionGate {
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) roles: Arc<dyn RoleStore>,
}

impl SessionGate {
    pub fn new(identity: Arc<dyn IdentityProvider>, roles: Arc<dyn RoleStore>) -> Self {
        Self { identity, roles }
    }

    pub fn identity_provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Run the gate for the session named by `ctx`.
    pub async fn check(&self, ctx: &SessionContext) -> GateDecision {
        if ctx.is_anonymous() {
            return GateDecision::Unauthenticated(None);
        }

        let session = match self.identity.current_session(ctx).await {
            Ok(Some(session)) => session,
            Ok(None) => return GateDecision::Unauthenticated(None),
            Err(e) => {
                warn!(error = %e, "session lookup failed during gate check");
                return GateDecision::Unauthenticated(Some(GateNotice::Unavailable));
            }
        };

        match self.is_admin(&session.identity.id).await {
            Ok(true) => GateDecision::Authorized(session.identity),
            Ok(false) => {
                debug!(user_id = %session.identity.id, "session lacks admin role, signing out");
                self.force_sign_out(ctx).await;
                GateDecision::Unauthorized
            }
            Err(e) => {
                warn!(error = %e, user_id = %session.identity.id, "role lookup failed during gate check");
                GateDecision::Unauthenticated(Some(GateNotice::Unavailable))
            }
        }
    }

    /// Run the gate unless `cancel` fires first.
    ///
    /// Returns `None` when the decision point was torn down while the check
    /// was in flight; the stale result must not be acted on.
    pub async fn check_unless_cancelled(
        &self,
        ctx: &SessionContext,
        cancel: &CancellationToken,
    ) -> Option<GateDecision> {
        if cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            decision = self.check(ctx) => {
                if cancel.is_cancelled() { None } else { Some(decision) }
            }
        }
    }

    /// Whether `user_id` currently holds the admin role.
    pub async fn is_admin(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.roles.find_role(user_id, Role::Admin).await?.is_some())
    }

    /// Best-effort sign-out; failures are logged and otherwise ignored.
    pub(crate) async fn force_sign_out(&self, ctx: &SessionContext) {
        if let Err(e) = self.identity.sign_out(ctx).await {
            warn!(error = %e, "forced sign-out failed");
        }
    }
}
