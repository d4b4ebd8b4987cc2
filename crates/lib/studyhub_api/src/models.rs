//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyhub_core::auth::IdentityRef;
use studyhub_core::content::NewResource;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Error body of the RPC-style function endpoints.
#[derive(Debug, Serialize)]
pub struct FunctionErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub email: String,
}

impl From<IdentityRef> for UserDto {
    fn from(identity: IdentityRef) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
        }
    }
}

/// Credentials for `/admin/login` and `/functions/v1/create-admin`.
///
/// Missing and `null` fields read as empty so the handlers can answer with
/// their own validation error.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl CredentialsRequest {
    pub fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserDto,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub struct ProvisionResponse {
    pub success: bool,
    pub message: String,
    pub user: UserDto,
}

/// Resource metadata plus a base64-encoded file. Field names follow the
/// resource columns (`course_code`, `file_name`).
#[derive(Debug, Deserialize)]
pub struct UploadResourceRequest {
    #[serde(flatten)]
    pub resource: NewResource,
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Standard base64 of the file bytes.
    pub data: String,
}

fn default_content_type() -> String {
    "application/octet-stream".into()
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyChatRequest {
    #[serde(default)]
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct StudyChatResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
}
