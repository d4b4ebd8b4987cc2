//! In-process backend implementing every external contract.
//!
//! Used for local development (`STUDYHUB_BACKEND=memory`) and tests. It keeps
//! the same trust boundary as the hosted backend: content writes are
//! authorized inside the store from the caller's token, independently of any
//! gate decision the caller holds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::auth::jwt::{self, ACCESS_TOKEN_EXPIRY_SECS, AccessClaims};
use crate::auth::password;
use crate::auth::{
    IdentityError, IdentityProvider, IdentityRef, Role, RoleAssignment, RoleStore, Session,
    SessionContext, StoreError,
};
use crate::chat::{ChatMessage, ChatStore};
use crate::content::{
    CommunityPost, ContentStore, FileUpload, NewCommunityPost, NewResource, Resource,
    ResourceCategory, StoredFile, Suggestion, SuggestionReview, SuggestionStatus,
};

/// bcrypt cost for in-process identities. Kept low: this backend never holds
/// real credentials.
const MEMORY_BCRYPT_COST: u32 = 4;

/// Storage bucket name used in public URLs.
const BUCKET: &str = "resources";

/// Base of public object URLs.
const PUBLIC_BASE: &str = "memory://studyhub";

const INVALID_LOGIN: &str = "Invalid login credentials";

struct StoredIdentity {
    identity: IdentityRef,
    password_hash: String,
}

struct Conversation {
    owner: String,
    messages: Vec<ChatMessage>,
}

#[derive(Default)]
struct MemoryState {
    identities: Vec<StoredIdentity>,
    /// Live sessions: session id → identity id.
    sessions: HashMap<String, String>,
    roles: Vec<RoleAssignment>,
    resources: Vec<Resource>,
    suggestions: Vec<Suggestion>,
    posts: Vec<CommunityPost>,
    objects: HashMap<String, Vec<u8>>,
    conversations: HashMap<String, Conversation>,
}

impl MemoryState {
    fn identity_by_email(&self, email: &str) -> Option<&StoredIdentity> {
        self.identities
            .iter()
            .find(|s| s.identity.email.eq_ignore_ascii_case(email))
    }

    fn identity_by_id(&self, id: &str) -> Option<&IdentityRef> {
        self.identities
            .iter()
            .map(|s| &s.identity)
            .find(|identity| identity.id == id)
    }

    fn has_role(&self, user_id: &str, role: Role) -> bool {
        self.roles.iter().any(|r| r.user_id == user_id && r.role == role)
    }
}

/// Shared in-process backend. Clones share state.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
    secret: Arc<String>,
    session_ttl: Duration,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            secret: Arc::new(jwt::generate_secret()),
            session_ttl: Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS),
        }
    }

    /// Set the lifetime of newly issued access tokens.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Create (or reuse) an identity and grant it `roles`.
    pub async fn seed_identity(
        &self,
        email: &str,
        password: &str,
        roles: &[Role],
    ) -> Result<IdentityRef, IdentityError> {
        let identity = match self.create_identity(email, password, true).await {
            Ok(identity) => identity,
            Err(IdentityError::AlreadyRegistered(_)) => self
                .identity_by_email(email)
                .await
                .ok_or_else(|| IdentityError::Provider("seeded identity vanished".into()))?,
            Err(e) => return Err(e),
        };
        for role in roles {
            if self.find_role(&identity.id, *role).await.ok().flatten().is_none() {
                self.insert_role(&identity.id, *role)
                    .await
                    .map_err(|e| IdentityError::Provider(e.to_string()))?;
            }
        }
        Ok(identity)
    }

    /// Insert a pending suggestion, returning its id.
    pub async fn seed_suggestion(&self, title: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.state.write().await.suggestions.push(Suggestion {
            id: id.clone(),
            title: title.to_string(),
            description: format!("Please add {title}"),
            category: ResourceCategory::Notes,
            course_code: None,
            year: None,
            status: Some(SuggestionStatus::Pending),
            reviewer_notes: None,
            reviewed_at: None,
            submitted_at: Some(Utc::now()),
        });
        id
    }

    pub async fn identity_by_email(&self, email: &str) -> Option<IdentityRef> {
        self.state
            .read()
            .await
            .identity_by_email(email)
            .map(|s| s.identity.clone())
    }

    pub async fn identity_count(&self) -> usize {
        self.state.read().await.identities.len()
    }

    /// Number of stored objects.
    pub async fn object_count(&self) -> usize {
        self.state.read().await.objects.len()
    }

    /// Number of `(user_id, role)` rows.
    pub async fn role_rows(&self, user_id: &str, role: Role) -> usize {
        self.state
            .read()
            .await
            .roles
            .iter()
            .filter(|r| r.user_id == user_id && r.role == role)
            .count()
    }

    /// Remove every grant of `role` from `user_id`.
    pub async fn revoke_role(&self, user_id: &str, role: Role) {
        self.state
            .write()
            .await
            .roles
            .retain(|r| !(r.user_id == user_id && r.role == role));
    }

    /// End every live session of `user_id`.
    pub async fn revoke_sessions(&self, user_id: &str) {
        self.state.write().await.sessions.retain(|_, owner| owner != user_id);
    }

    pub async fn live_session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn resource_count(&self) -> usize {
        self.state.read().await.resources.len()
    }

    pub async fn post_count(&self) -> usize {
        self.state.read().await.posts.len()
    }

    /// Claims of a token naming a live session.
    fn live_claims(&self, state: &MemoryState, ctx: &SessionContext) -> Option<AccessClaims> {
        let token = ctx.access_token()?;
        let claims = jwt::verify_access_token(token, self.secret.as_bytes())?;
        match state.sessions.get(&claims.sid) {
            Some(owner) if *owner == claims.sub => Some(claims),
            _ => None,
        }
    }

    /// Store-side authorization for content writes.
    fn authorize_admin(&self, state: &MemoryState, ctx: &SessionContext) -> Result<String, StoreError> {
        let claims = self
            .live_claims(state, ctx)
            .ok_or_else(|| StoreError::Unauthorized("JWT expired or invalid".into()))?;
        if !state.has_role(&claims.sub, Role::Admin) {
            return Err(StoreError::Unauthorized(
                "new row violates row-level security policy".into(),
            ));
        }
        Ok(claims.sub)
    }

    fn authorize_user(&self, state: &MemoryState, ctx: &SessionContext) -> Result<String, StoreError> {
        self.live_claims(state, ctx)
            .map(|claims| claims.sub)
            .ok_or_else(|| StoreError::Unauthorized("JWT expired or invalid".into()))
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let (identity, hash) = {
            let state = self.state.read().await;
            match state.identity_by_email(email) {
                Some(stored) => (stored.identity.clone(), stored.password_hash.clone()),
                None => return Err(IdentityError::InvalidCredentials(INVALID_LOGIN.into())),
            }
        };

        if !password::verify_password(password, &hash)? {
            return Err(IdentityError::InvalidCredentials(INVALID_LOGIN.into()));
        }

        let session_id = Uuid::new_v4().to_string();
        let (access_token, claims) = jwt::generate_access_token(
            &identity.id,
            &identity.email,
            &session_id,
            self.session_ttl,
            self.secret.as_bytes(),
        )?;
        self.state
            .write()
            .await
            .sessions
            .insert(session_id, identity.id.clone());
        debug!(user_id = %identity.id, "memory session issued");

        Ok(Session {
            access_token,
            identity,
            expires_at: claims.expires_at(),
        })
    }

    async fn current_session(&self, ctx: &SessionContext) -> Result<Option<Session>, IdentityError> {
        let state = self.state.read().await;
        let Some(claims) = self.live_claims(&state, ctx) else {
            return Ok(None);
        };
        let Some(identity) = state.identity_by_id(&claims.sub).cloned() else {
            return Ok(None);
        };
        Ok(Some(Session {
            access_token: ctx.access_token().unwrap_or_default().to_string(),
            identity,
            expires_at: claims.expires_at(),
        }))
    }

    async fn sign_out(&self, ctx: &SessionContext) -> Result<(), IdentityError> {
        let Some(token) = ctx.access_token() else {
            return Ok(());
        };
        if let Some(claims) = jwt::verify_access_token(token, self.secret.as_bytes()) {
            self.state.write().await.sessions.remove(&claims.sid);
        }
        Ok(())
    }

    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        _preconfirmed: bool,
    ) -> Result<IdentityRef, IdentityError> {
        let email = email.trim().to_ascii_lowercase();
        let password_hash = password::hash_password(password, MEMORY_BCRYPT_COST)?;

        let mut state = self.state.write().await;
        if state.identity_by_email(&email).is_some() {
            return Err(IdentityError::AlreadyRegistered(
                "A user with this email address has already been registered".into(),
            ));
        }
        let identity = IdentityRef {
            id: Uuid::new_v4().to_string(),
            email,
        };
        state.identities.push(StoredIdentity {
            identity: identity.clone(),
            password_hash,
        });
        Ok(identity)
    }

    async fn list_identities(&self) -> Result<Vec<IdentityRef>, IdentityError> {
        Ok(self
            .state
            .read()
            .await
            .identities
            .iter()
            .map(|s| s.identity.clone())
            .collect())
    }
}

#[async_trait]
impl RoleStore for MemoryBackend {
    async fn find_role(&self, user_id: &str, role: Role) -> Result<Option<RoleAssignment>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .iter()
            .find(|r| r.user_id == user_id && r.role == role)
            .cloned())
    }

    async fn insert_role(&self, user_id: &str, role: Role) -> Result<RoleAssignment, StoreError> {
        let assignment = RoleAssignment {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            role,
            created_at: Some(Utc::now()),
        };
        let mut state = self.state.write().await;
        if state.roles.iter().any(|r| r.user_id == user_id && r.role == role) {
            return Err(StoreError::Backend(format!(
                "duplicate key value violates unique constraint: ({user_id}, {role})"
            )));
        }
        state.roles.push(assignment.clone());
        Ok(assignment)
    }
}

#[async_trait]
impl ContentStore for MemoryBackend {
    async fn insert_resource(
        &self,
        ctx: &SessionContext,
        resource: &NewResource,
        created_by: &str,
    ) -> Result<Resource, StoreError> {
        let mut state = self.state.write().await;
        self.authorize_admin(&state, ctx)?;
        let row = Resource {
            id: Uuid::new_v4().to_string(),
            title: resource.title.clone(),
            category: resource.category,
            course_code: resource.course_code.clone(),
            year: resource.year,
            description: resource.description.clone(),
            external_link: resource.external_link.clone(),
            file_url: resource.file_url.clone(),
            file_size: resource.file_size,
            file_type: resource.file_type.clone(),
            created_by: Some(created_by.to_string()),
            download_count: Some(0),
            created_at: Some(Utc::now()),
        };
        state.resources.push(row.clone());
        Ok(row)
    }

    async fn delete_resource(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        self.authorize_admin(&state, ctx)?;
        let before = state.resources.len();
        state.resources.retain(|r| r.id != id);
        if state.resources.len() == before {
            return Err(StoreError::NotFound(format!("resource {id}")));
        }
        Ok(())
    }

    async fn upload_file(
        &self,
        ctx: &SessionContext,
        path: &str,
        upload: &FileUpload,
    ) -> Result<StoredFile, StoreError> {
        let mut state = self.state.write().await;
        self.authorize_admin(&state, ctx)?;
        if state.objects.contains_key(path) {
            return Err(StoreError::Backend(format!("object {path} already exists")));
        }
        state.objects.insert(path.to_string(), upload.bytes.clone());
        Ok(StoredFile {
            path: path.to_string(),
            public_url: format!("{PUBLIC_BASE}/storage/v1/object/public/{BUCKET}/{path}"),
            size: upload.bytes.len() as i64,
        })
    }

    async fn remove_file(&self, ctx: &SessionContext, path: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        self.authorize_admin(&state, ctx)?;
        state
            .objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("object {path}")))
    }

    async fn review_suggestion(
        &self,
        ctx: &SessionContext,
        id: &str,
        review: &SuggestionReview,
    ) -> Result<Suggestion, StoreError> {
        let mut state = self.state.write().await;
        self.authorize_admin(&state, ctx)?;
        let suggestion = state
            .suggestions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("suggestion {id}")))?;
        suggestion.status = Some(review.status);
        suggestion.reviewer_notes = review.reviewer_notes.clone();
        suggestion.reviewed_at = Some(Utc::now());
        Ok(suggestion.clone())
    }

    async fn delete_suggestion(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        self.authorize_admin(&state, ctx)?;
        let before = state.suggestions.len();
        state.suggestions.retain(|s| s.id != id);
        if state.suggestions.len() == before {
            return Err(StoreError::NotFound(format!("suggestion {id}")));
        }
        Ok(())
    }

    async fn insert_post(
        &self,
        ctx: &SessionContext,
        post: &NewCommunityPost,
        created_by: &str,
    ) -> Result<CommunityPost, StoreError> {
        let mut state = self.state.write().await;
        self.authorize_admin(&state, ctx)?;
        let row = CommunityPost {
            id: Uuid::new_v4().to_string(),
            title: post.title.clone(),
            content: post.content.clone(),
            image_url: post.image_url.clone(),
            created_by: created_by.to_string(),
            created_at: Some(Utc::now()),
        };
        state.posts.push(row.clone());
        Ok(row)
    }

    async fn delete_post(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        self.authorize_admin(&state, ctx)?;
        let before = state.posts.len();
        state.posts.retain(|p| p.id != id);
        if state.posts.len() == before {
            return Err(StoreError::NotFound(format!("community post {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryBackend {
    async fn conversation_messages(
        &self,
        ctx: &SessionContext,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let state = self.state.read().await;
        let user_id = self.authorize_user(&state, ctx)?;
        Ok(state
            .conversations
            .get(conversation_id)
            .filter(|c| c.owner == user_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default())
    }

    async fn append_message(
        &self,
        ctx: &SessionContext,
        conversation_id: &str,
        message: &ChatMessage,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let user_id = self.authorize_user(&state, ctx)?;
        let conversation = state
            .conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| Conversation {
                owner: user_id.clone(),
                messages: Vec::new(),
            });
        if conversation.owner != user_id {
            return Err(StoreError::Unauthorized(
                "new row violates row-level security policy".into(),
            ));
        }
        let mut message = message.clone();
        message.created_at.get_or_insert_with(Utc::now);
        conversation.messages.push(message);
        Ok(())
    }
}
