//! Admin area: login, logout and the dashboard entry check.

use axum::extract::State;
use axum::{Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::warn;

use studyhub_core::auth::jwt::ACCESS_TOKEN_EXPIRY_SECS;
use studyhub_core::auth::{GateDecision, SessionContext};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::AdminJson;
use crate::models::{CredentialsRequest, DashboardResponse, LoginResponse, LogoutResponse};
use crate::services::cookies::{access_cookie, clear_access_cookie};

/// `POST /admin/login`: credential exchange followed by the admin role check.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    AdminJson(body): AdminJson<CredentialsRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let session = state.gate.login(body.email(), body.password()).await?;

    let max_age = session
        .expires_at
        .map(|at| (at - Utc::now()).num_seconds())
        .unwrap_or(ACCESS_TOKEN_EXPIRY_SECS);
    let jar = jar.add(access_cookie(
        &session.access_token,
        max_age,
        state.config.secure_cookies,
    ));

    Ok((
        jar,
        Json(LoginResponse {
            user: session.identity.into(),
            access_token: session.access_token,
            expires_at: session.expires_at,
        }),
    ))
}

/// `POST /admin/logout`: idempotent sign-out.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    if let Err(e) = state.gate.identity_provider().sign_out(&ctx).await {
        warn!(error = %e, "sign-out failed");
    }
    (jar.add(clear_access_cookie()), Json(LogoutResponse { success: true }))
}

/// `GET /admin/dashboard`: gate check on entry.
pub async fn dashboard_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<DashboardResponse>> {
    let decision = state
        .gate
        .check_unless_cancelled(&ctx, &state.shutdown)
        .await
        .ok_or(AppError::Unavailable)?;

    match decision {
        GateDecision::Authorized(identity) => Ok(Json(DashboardResponse {
            user: identity.into(),
        })),
        other => Err(AppError::SessionRequired(other)),
    }
}
