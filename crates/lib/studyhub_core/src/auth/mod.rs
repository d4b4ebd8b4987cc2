//! Authentication and authorization logic.
//!
//! The identity provider and role store are external collaborators reached
//! through the traits in [`identity`] and [`roles`]. Everything that decides
//! who may reach the admin area lives here and takes the caller's
//! [`SessionContext`] explicitly.

pub mod gate;
pub mod identity;
pub mod jwt;
pub mod login;
pub mod password;
pub mod provision;
pub mod roles;

pub use gate::{GateDecision, GateNotice, SessionGate};
pub use identity::{IdentityError, IdentityProvider, IdentityRef, Session, SessionContext};
pub use login::LoginError;
pub use provision::{AdminProvisioner, ProvisionError, ProvisionOutcome, ProvisionStatus};
pub use roles::{Role, RoleAssignment, RoleStore, StoreError};

/// Path of the admin login view every non-authorized gate decision points to.
pub const ADMIN_LOGIN_PATH: &str = "/admin/login";

/// Path of the protected admin dashboard.
pub const ADMIN_DASHBOARD_PATH: &str = "/admin/dashboard";
