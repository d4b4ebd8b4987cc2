//! GoTrue identity provider.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{SupabaseConfig, error_code, error_message};
use crate::auth::{IdentityError, IdentityProvider, IdentityRef, Session, SessionContext};

/// Page size used when listing identities.
const LIST_PAGE_SIZE: u32 = 200;

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserBody> for IdentityRef {
    fn from(user: UserBody) -> Self {
        IdentityRef {
            id: user.id,
            email: user.email.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserBody,
}

impl TokenBody {
    fn expiry(&self) -> Option<DateTime<Utc>> {
        match (self.expires_at, self.expires_in) {
            (Some(at), _) => Utc.timestamp_opt(at, 0).single(),
            (None, Some(secs)) => Some(Utc::now() + chrono::Duration::seconds(secs)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<UserBody>,
}

/// [`IdentityProvider`] backed by Supabase Auth.
#[derive(Clone)]
pub struct SupabaseAuth {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn public(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.config.anon_key)
    }

    fn admin(&self, builder: RequestBuilder) -> Result<RequestBuilder, IdentityError> {
        let key = self.config.service_role_key.as_deref().ok_or_else(|| {
            IdentityError::NotConfigured("SUPABASE_SERVICE_ROLE_KEY is not set".into())
        })?;
        Ok(builder.header("apikey", key).bearer_auth(key))
    }

    async fn failure(resp: reqwest::Response) -> (StatusCode, String) {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        (status, body)
    }
}

fn transport(e: reqwest::Error) -> IdentityError {
    IdentityError::Provider(format!("request failed: {e}"))
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let resp = self
            .public(self.client.post(self.config.endpoint("/auth/v1/token")))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            let (status, body) = Self::failure(resp).await;
            let msg = error_message(status, &body);
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                    IdentityError::InvalidCredentials(msg)
                }
                _ => IdentityError::Provider(msg),
            });
        }

        let body: TokenBody = resp
            .json()
            .await
            .map_err(|e| IdentityError::Provider(format!("invalid token response: {e}")))?;
        let expires_at = body.expiry();
        Ok(Session {
            access_token: body.access_token,
            identity: body.user.into(),
            expires_at,
        })
    }

    async fn current_session(&self, ctx: &SessionContext) -> Result<Option<Session>, IdentityError> {
        let Some(token) = ctx.access_token() else {
            return Ok(None);
        };

        let resp = self
            .public(self.client.get(self.config.endpoint("/auth/v1/user")))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        match resp.status() {
            s if s.is_success() => {
                let user: UserBody = resp
                    .json()
                    .await
                    .map_err(|e| IdentityError::Provider(format!("invalid user response: {e}")))?;
                Ok(Some(Session {
                    access_token: token.to_string(),
                    identity: user.into(),
                    expires_at: None,
                }))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!("access token rejected by provider");
                Ok(None)
            }
            _ => {
                let (status, body) = Self::failure(resp).await;
                Err(IdentityError::Provider(error_message(status, &body)))
            }
        }
    }

    async fn sign_out(&self, ctx: &SessionContext) -> Result<(), IdentityError> {
        let Some(token) = ctx.access_token() else {
            return Ok(());
        };

        let resp = self
            .public(self.client.post(self.config.endpoint("/auth/v1/logout")))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            // Token already invalid: nothing left to end.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(()),
            _ => {
                let (status, body) = Self::failure(resp).await;
                Err(IdentityError::Provider(error_message(status, &body)))
            }
        }
    }

    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        preconfirmed: bool,
    ) -> Result<IdentityRef, IdentityError> {
        let resp = self
            .admin(self.client.post(self.config.endpoint("/auth/v1/admin/users")))?
            .json(&json!({
                "email": email,
                "password": password,
                "email_confirm": preconfirmed,
            }))
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            let (status, body) = Self::failure(resp).await;
            let msg = error_message(status, &body);
            if is_already_registered(error_code(&body).as_deref(), &msg) {
                return Err(IdentityError::AlreadyRegistered(msg));
            }
            warn!(%status, "identity creation rejected");
            return Err(IdentityError::Provider(msg));
        }

        let user: UserBody = resp
            .json()
            .await
            .map_err(|e| IdentityError::Provider(format!("invalid user response: {e}")))?;
        Ok(user.into())
    }

    async fn list_identities(&self) -> Result<Vec<IdentityRef>, IdentityError> {
        let mut identities = Vec::new();
        let mut page = 1u32;
        loop {
            let resp = self
                .admin(self.client.get(self.config.endpoint("/auth/v1/admin/users")))?
                .query(&[("page", page), ("per_page", LIST_PAGE_SIZE)])
                .send()
                .await
                .map_err(transport)?;

            if !resp.status().is_success() {
                let (status, body) = Self::failure(resp).await;
                return Err(IdentityError::Provider(error_message(status, &body)));
            }

            let list: UserList = resp
                .json()
                .await
                .map_err(|e| IdentityError::Provider(format!("invalid user list: {e}")))?;
            let fetched = list.users.len();
            identities.extend(list.users.into_iter().map(IdentityRef::from));

            if fetched < LIST_PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }
        debug!(count = identities.len(), "listed identities");
        Ok(identities)
    }
}

fn is_already_registered(code: Option<&str>, message: &str) -> bool {
    matches!(code, Some("email_exists") | Some("user_already_exists"))
        || message.to_ascii_lowercase().contains("already been registered")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> SupabaseAuth {
        let config = SupabaseConfig::new("http://127.0.0.1:9", "anon", None);
        let client = config.client().unwrap();
        SupabaseAuth::new(config, client)
    }

    #[test]
    fn already_registered_detection() {
        assert!(is_already_registered(Some("email_exists"), "whatever"));
        assert!(is_already_registered(
            None,
            "A user with this email address has already been registered"
        ));
        assert!(!is_already_registered(Some("weak_password"), "Password should be longer"));
    }

    #[test]
    fn token_expiry_prefers_absolute_timestamp() {
        let body: TokenBody = serde_json::from_str(
            r#"{"access_token":"t","expires_at":1700000000,"expires_in":3600,"user":{"id":"u","email":"a@b.c"}}"#,
        )
        .unwrap();
        assert_eq!(body.expiry().unwrap().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn admin_calls_without_service_key_are_not_configured() {
        let auth = unconfigured();

        let err = auth.create_identity("a@b.c", "pw", true).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured(_)));

        let err = auth.list_identities().await.unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn anonymous_context_needs_no_request() {
        let auth = unconfigured();
        let ctx = SessionContext::anonymous();

        assert!(auth.current_session(&ctx).await.unwrap().is_none());
        auth.sign_out(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_provider_error() {
        let auth = unconfigured();

        let err = auth.verify_credentials("a@b.c", "pw").await.unwrap_err();

        assert!(matches!(err, IdentityError::Provider(_)));
    }
}
