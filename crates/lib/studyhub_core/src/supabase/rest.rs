//! PostgREST relations and Storage objects.
//!
//! Role lookups run with the service credential. Content and chat calls carry
//! the caller's own access token so row-level security decides what they may
//! write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::{SupabaseConfig, error_message};
use crate::auth::{Role, RoleAssignment, RoleStore, SessionContext, StoreError};
use crate::chat::{ChatMessage, ChatRole, ChatStore};
use crate::content::{
    CommunityPost, ContentStore, FileUpload, NewCommunityPost, NewResource, Resource, StoredFile,
    Suggestion, SuggestionReview,
};

/// Storage bucket for uploaded resource files.
pub const RESOURCE_BUCKET: &str = "resources";

#[derive(Debug, Deserialize)]
struct RoleRow {
    id: String,
    user_id: String,
    role: Role,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<RoleRow> for RoleAssignment {
    fn from(row: RoleRow) -> Self {
        RoleAssignment {
            id: row.id,
            user_id: row.user_id,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    role: ChatRole,
    content: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// [`RoleStore`], [`ContentStore`] and [`ChatStore`] over Supabase.
#[derive(Clone)]
pub struct SupabaseRest {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseRest {
    pub fn new(config: SupabaseConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn table(&self, name: &str) -> String {
        self.config.endpoint(&format!("/rest/v1/{name}"))
    }

    /// Request authorized as the service role.
    fn service(&self, builder: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        let key = self
            .config
            .service_role_key
            .as_deref()
            .ok_or_else(|| StoreError::Backend("SUPABASE_SERVICE_ROLE_KEY is not set".into()))?;
        Ok(builder.header("apikey", key).bearer_auth(key))
    }

    /// Request authorized as the caller. Anonymous callers use the anon key.
    fn caller(&self, builder: RequestBuilder, ctx: &SessionContext) -> RequestBuilder {
        let builder = builder.header("apikey", &self.config.anon_key);
        match ctx.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder.bearer_auth(&self.config.anon_key),
        }
    }

    fn object_url(&self, public: bool, path: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.config.url)
            .map_err(|e| StoreError::Backend(format!("invalid SUPABASE_URL: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Backend("SUPABASE_URL cannot be a base".into()))?;
            segments.pop_if_empty().extend(["storage", "v1", "object"]);
            if public {
                segments.push("public");
            }
            segments.push(RESOURCE_BUCKET);
            segments.extend(path.split('/'));
        }
        Ok(url)
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Backend(format!("request failed: {e}"))
}

/// Map a non-success response to a [`StoreError`].
async fn reject(resp: Response) -> StoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let msg = error_message(status, &body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(msg),
        StatusCode::NOT_FOUND => StoreError::NotFound(msg),
        _ => StoreError::Backend(msg),
    }
}

/// Decode a `return=representation` body.
async fn rows<T: DeserializeOwned>(resp: Response) -> Result<Vec<T>, StoreError> {
    if !resp.status().is_success() {
        return Err(reject(resp).await);
    }
    resp.json()
        .await
        .map_err(|e| StoreError::Backend(format!("invalid response body: {e}")))
}

/// First row of a representation; an empty result means no row matched.
async fn single<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, StoreError> {
    rows(resp)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound(what.to_string()))
}

#[async_trait]
impl RoleStore for SupabaseRest {
    async fn find_role(&self, user_id: &str, role: Role) -> Result<Option<RoleAssignment>, StoreError> {
        let resp = self
            .service(self.client.get(self.table("user_roles")))?
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("role", format!("eq.{role}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;
        let found: Vec<RoleRow> = rows(resp).await?;
        Ok(found.into_iter().next().map(RoleAssignment::from))
    }

    async fn insert_role(&self, user_id: &str, role: Role) -> Result<RoleAssignment, StoreError> {
        let resp = self
            .service(self.client.post(self.table("user_roles")))?
            .header("Prefer", "return=representation")
            .json(&json!({ "user_id": user_id, "role": role }))
            .send()
            .await
            .map_err(transport)?;
        let row: RoleRow = single(resp, "inserted role").await?;
        debug!(user_id, %role, "role row inserted");
        Ok(row.into())
    }
}

impl SupabaseRest {
    async fn delete_by_id(&self, ctx: &SessionContext, table: &str, id: &str) -> Result<(), StoreError> {
        let resp = self
            .caller(self.client.delete(self.table(table)), ctx)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await
            .map_err(transport)?;
        let deleted: Vec<serde_json::Value> = rows(resp).await?;
        if deleted.is_empty() {
            // Row-level security hides rows instead of rejecting the delete,
            // so "not visible" and "absent" look the same here.
            return Err(StoreError::NotFound(format!("{table} {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for SupabaseRest {
    async fn insert_resource(
        &self,
        ctx: &SessionContext,
        resource: &NewResource,
        created_by: &str,
    ) -> Result<Resource, StoreError> {
        let mut body = serde_json::to_value(resource)
            .map_err(|e| StoreError::Backend(format!("encode resource: {e}")))?;
        body["created_by"] = json!(created_by);

        let resp = self
            .caller(self.client.post(self.table("resources")), ctx)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        single(resp, "inserted resource").await
    }

    async fn delete_resource(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError> {
        self.delete_by_id(ctx, "resources", id).await
    }

    async fn upload_file(
        &self,
        ctx: &SessionContext,
        path: &str,
        upload: &FileUpload,
    ) -> Result<StoredFile, StoreError> {
        let resp = self
            .caller(self.client.post(self.object_url(false, path)?), ctx)
            .header("Content-Type", &upload.content_type)
            .header("x-upsert", "false")
            .body(upload.bytes.clone())
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            let err = reject(resp).await;
            warn!(path, error = %err, "object upload rejected");
            return Err(err);
        }

        Ok(StoredFile {
            path: path.to_string(),
            public_url: self.object_url(true, path)?.to_string(),
            size: upload.bytes.len() as i64,
        })
    }

    async fn remove_file(&self, ctx: &SessionContext, path: &str) -> Result<(), StoreError> {
        let resp = self
            .caller(self.client.delete(self.object_url(false, path)?), ctx)
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(reject(resp).await);
        }
        Ok(())
    }

    async fn review_suggestion(
        &self,
        ctx: &SessionContext,
        id: &str,
        review: &SuggestionReview,
    ) -> Result<Suggestion, StoreError> {
        let resp = self
            .caller(self.client.patch(self.table("suggestions")), ctx)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{id}"))])
            .json(&json!({
                "status": review.status,
                "reviewer_notes": review.reviewer_notes,
                "reviewed_at": Utc::now(),
            }))
            .send()
            .await
            .map_err(transport)?;
        single(resp, &format!("suggestion {id}")).await
    }

    async fn delete_suggestion(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError> {
        self.delete_by_id(ctx, "suggestions", id).await
    }

    async fn insert_post(
        &self,
        ctx: &SessionContext,
        post: &NewCommunityPost,
        created_by: &str,
    ) -> Result<CommunityPost, StoreError> {
        let resp = self
            .caller(self.client.post(self.table("community_posts")), ctx)
            .header("Prefer", "return=representation")
            .json(&json!({
                "title": post.title,
                "content": post.content,
                "image_url": post.image_url,
                "created_by": created_by,
            }))
            .send()
            .await
            .map_err(transport)?;
        single(resp, "inserted community post").await
    }

    async fn delete_post(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError> {
        self.delete_by_id(ctx, "community_posts", id).await
    }
}

#[async_trait]
impl ChatStore for SupabaseRest {
    async fn conversation_messages(
        &self,
        ctx: &SessionContext,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let resp = self
            .caller(self.client.get(self.table("chat_messages")), ctx)
            .query(&[
                ("select", "role,content,created_at".to_string()),
                ("conversation_id", format!("eq.{conversation_id}")),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;
        let found: Vec<MessageRow> = rows(resp).await?;
        Ok(found
            .into_iter()
            .map(|row| ChatMessage {
                role: row.role,
                content: row.content,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn append_message(
        &self,
        ctx: &SessionContext,
        conversation_id: &str,
        message: &ChatMessage,
    ) -> Result<(), StoreError> {
        let resp = self
            .caller(self.client.post(self.table("chat_messages")), ctx)
            .header("Prefer", "return=minimal")
            .json(&json!({
                "conversation_id": conversation_id,
                "role": message.role,
                "content": message.content,
            }))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(reject(resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rest(service_key: Option<&str>) -> SupabaseRest {
        let config = SupabaseConfig::new(
            "https://proj.supabase.co",
            "anon",
            service_key.map(str::to_string),
        );
        let client = config.client().unwrap();
        SupabaseRest::new(config, client)
    }

    #[test]
    fn object_urls_encode_each_segment() {
        let rest = rest(None);

        let upload = rest.object_url(false, "CS101/2024/1-abc-notes v2.pdf").unwrap();
        let public = rest.object_url(true, "CS101/2024/1-abc-notes v2.pdf").unwrap();

        assert_eq!(
            upload.as_str(),
            "https://proj.supabase.co/storage/v1/object/resources/CS101/2024/1-abc-notes%20v2.pdf"
        );
        assert_eq!(
            public.as_str(),
            "https://proj.supabase.co/storage/v1/object/public/resources/CS101/2024/1-abc-notes%20v2.pdf"
        );
    }

    #[test]
    fn role_rows_decode() {
        let row: RoleRow = serde_json::from_str(
            r#"{"id":"r1","user_id":"u1","role":"admin","created_at":"2024-05-01T10:00:00+00:00"}"#,
        )
        .unwrap();
        let assignment = RoleAssignment::from(row);
        assert_eq!(assignment.role, Role::Admin);
        assert!(assignment.created_at.is_some());
    }

    #[tokio::test]
    async fn role_lookup_without_service_key_fails_before_any_request() {
        let err = rest(None).find_role("u1", Role::Admin).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
