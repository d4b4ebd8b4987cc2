//! Protected action dispatcher: privileged content mutations behind the gate.
//!
//! A mutation runs only for an `Authorized` decision, and is refused locally
//! otherwise. The content store still authorizes every write itself: if it
//! rejects a locally authorized caller, the session most likely ended between
//! gate and dispatch, so the gate is re-run and `SessionExpired` returned.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    CommunityPost, ContentStore, FileUpload, NewCommunityPost, NewResource, Resource, Suggestion,
    SuggestionReview,
};
use crate::auth::{GateDecision, GateNotice, SessionContext, SessionGate, StoreError};

/// A privileged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectedAction {
    CreateResource(NewResource),
    /// Store the file, then record the resource pointing at its URL.
    UploadResource {
        resource: NewResource,
        file: FileUpload,
    },
    DeleteResource {
        id: String,
    },
    ReviewSuggestion {
        id: String,
        review: SuggestionReview,
    },
    DeleteSuggestion {
        id: String,
    },
    CreateCommunityPost(NewCommunityPost),
    DeleteCommunityPost {
        id: String,
    },
}

impl ProtectedAction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ProtectedAction::CreateResource(_) => "create_resource",
            ProtectedAction::UploadResource { .. } => "upload_resource",
            ProtectedAction::DeleteResource { .. } => "delete_resource",
            ProtectedAction::ReviewSuggestion { .. } => "review_suggestion",
            ProtectedAction::DeleteSuggestion { .. } => "delete_suggestion",
            ProtectedAction::CreateCommunityPost(_) => "create_community_post",
            ProtectedAction::DeleteCommunityPost { .. } => "delete_community_post",
        }
    }
}

/// What a dispatched action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    ResourceCreated(Resource),
    ResourceDeleted { id: String },
    SuggestionReviewed(Suggestion),
    SuggestionDeleted { id: String },
    PostCreated(CommunityPost),
    PostDeleted { id: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Refused locally; nothing was sent to the store.
    #[error("Admin privileges required")]
    Forbidden,

    /// The store rejected a locally authorized caller. `decision` is the
    /// result of re-running the gate.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired { decision: GateDecision },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),
}

/// Executes privileged mutations for authorized callers.
#[derive(Clone)]
pub struct ProtectedActionDispatcher {
    gate: SessionGate,
    store: Arc<dyn ContentStore>,
}

impl ProtectedActionDispatcher {
    pub fn new(gate: SessionGate, store: Arc<dyn ContentStore>) -> Self {
        Self { gate, store }
    }

    /// Run `action` for the caller described by `(ctx, decision)`.
    pub async fn dispatch(
        &self,
        ctx: &SessionContext,
        decision: &GateDecision,
        action: ProtectedAction,
    ) -> Result<ActionOutcome, DispatchError> {
        let Some(actor) = decision.identity() else {
            debug!(action = action.name(), "refusing action without authorized gate decision");
            return Err(DispatchError::Forbidden);
        };
        let action_name = action.name();

        match self.execute(ctx, &actor.id, action).await {
            Ok(outcome) => {
                info!(action = action_name, user_id = %actor.id, "protected action completed");
                Ok(outcome)
            }
            Err(StoreError::Unauthorized(msg)) => {
                warn!(action = action_name, user_id = %actor.id, reason = %msg, "store rejected authorized caller, re-running gate");
                let decision = match self.gate.check(ctx).await {
                    GateDecision::Unauthenticated(None) => {
                        GateDecision::Unauthenticated(Some(GateNotice::SessionExpired))
                    }
                    other => other,
                };
                Err(DispatchError::SessionExpired { decision })
            }
            Err(StoreError::NotFound(msg)) => Err(DispatchError::NotFound(msg)),
            Err(StoreError::Backend(msg)) => {
                warn!(action = action_name, error = %msg, "protected action failed");
                Err(DispatchError::Store(msg))
            }
        }
    }

    async fn execute(
        &self,
        ctx: &SessionContext,
        actor_id: &str,
        action: ProtectedAction,
    ) -> Result<ActionOutcome, StoreError> {
        match action {
            ProtectedAction::CreateResource(resource) => self
                .store
                .insert_resource(ctx, &resource, actor_id)
                .await
                .map(ActionOutcome::ResourceCreated),
            ProtectedAction::UploadResource { mut resource, file } => {
                let path = storage_path(&resource, &file.file_name);
                let stored = self.store.upload_file(ctx, &path, &file).await?;
                resource.file_url = Some(stored.public_url);
                resource.file_size = Some(stored.size);
                resource.file_type = Some(file.content_type.clone());
                match self.store.insert_resource(ctx, &resource, actor_id).await {
                    Ok(row) => Ok(ActionOutcome::ResourceCreated(row)),
                    Err(e) => {
                        if let Err(cleanup) = self.store.remove_file(ctx, &stored.path).await {
                            warn!(path = %stored.path, error = %cleanup, "uploaded object left without a resource row");
                        }
                        Err(e)
                    }
                }
            }
            ProtectedAction::DeleteResource { id } => {
                self.store.delete_resource(ctx, &id).await?;
                Ok(ActionOutcome::ResourceDeleted { id })
            }
            ProtectedAction::ReviewSuggestion { id, review } => self
                .store
                .review_suggestion(ctx, &id, &review)
                .await
                .map(ActionOutcome::SuggestionReviewed),
            ProtectedAction::DeleteSuggestion { id } => {
                self.store.delete_suggestion(ctx, &id).await?;
                Ok(ActionOutcome::SuggestionDeleted { id })
            }
            ProtectedAction::CreateCommunityPost(post) => self
                .store
                .insert_post(ctx, &post, actor_id)
                .await
                .map(ActionOutcome::PostCreated),
            ProtectedAction::DeleteCommunityPost { id } => {
                self.store.delete_post(ctx, &id).await?;
                Ok(ActionOutcome::PostDeleted { id })
            }
        }
    }
}

/// Object path: `{course}/{year}/{timestamp}-{uuid}-{sanitized file name}`.
fn storage_path(resource: &NewResource, file_name: &str) -> String {
    let clean: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let clean = if clean.trim_matches('_').is_empty() {
        "file".to_string()
    } else {
        clean
    };
    format!(
        "{}/{}/{}-{}-{}",
        resource.course_code.trim().to_ascii_uppercase(),
        resource.year,
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        clean
    )
}
