//! Admin provisioning RPC.
//!
//! Runs with the deployment's service credential. The caller never supplies
//! one.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;
use crate::error::FunctionError;
use crate::extract::FunctionJson;
use crate::models::{CredentialsRequest, ProvisionResponse};

/// `POST /functions/v1/create-admin`
pub async fn create_admin_handler(
    State(state): State<AppState>,
    FunctionJson(body): FunctionJson<CredentialsRequest>,
) -> Result<Json<ProvisionResponse>, FunctionError> {
    let provisioner = state.provisioner.as_ref().ok_or_else(|| {
        FunctionError::new(StatusCode::SERVICE_UNAVAILABLE, "Admin provisioning is disabled")
    })?;

    let outcome = provisioner.provision(body.email(), body.password()).await?;

    Ok(Json(ProvisionResponse {
        success: true,
        message: outcome.message().to_string(),
        user: outcome.identity.into(),
    }))
}
