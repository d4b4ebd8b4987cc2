//! Study assistant: the session gate around the AI chat.
//!
//! Any signed-in identity may ask for a reply; no role is required. The
//! conversation history is read through [`ChatStore`] with the caller's own
//! session, so a caller can only continue conversations the store lets them
//! read.

pub mod gateway;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{IdentityProvider, SessionContext, StoreError};

pub use gateway::GatewayCompletion;

/// System prompt prepended to every conversation.
pub const SYSTEM_PROMPT: &str = "You are a helpful study assistant for university students. \
Help them understand concepts, explain topics, answer questions about their courses, \
and provide study tips. Be clear, encouraging, and educational.";

/// Author of a chat message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("conversationId is required")]
    MissingConversation,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("AI error: {0}")]
    Completion(String),

    #[error("Study assistant not configured")]
    NotConfigured,
}

/// Conversation history storage.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Messages of a conversation in creation order.
    async fn conversation_messages(
        &self,
        ctx: &SessionContext,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    async fn append_message(
        &self,
        ctx: &SessionContext,
        conversation_id: &str,
        message: &ChatMessage,
    ) -> Result<(), StoreError>;
}

/// Chat completion backend.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

/// Produces assistant replies for signed-in students.
#[derive(Clone)]
pub struct StudyAssistant {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn ChatStore>,
    completion: Option<Arc<dyn ChatCompletion>>,
}

impl StudyAssistant {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ChatStore>,
        completion: Option<Arc<dyn ChatCompletion>>,
    ) -> Self {
        Self {
            identity,
            store,
            completion,
        }
    }

    /// Generate, store and return the assistant's next message.
    pub async fn reply(
        &self,
        ctx: &SessionContext,
        conversation_id: &str,
    ) -> Result<String, ChatError> {
        let session = match self.identity.current_session(ctx).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(ChatError::Unauthenticated),
            Err(e) => {
                warn!(error = %e, "session lookup failed for study chat");
                return Err(ChatError::Unauthenticated);
            }
        };

        let conversation_id = conversation_id.trim();
        if conversation_id.is_empty() {
            return Err(ChatError::MissingConversation);
        }

        let completion = self.completion.as_ref().ok_or(ChatError::NotConfigured)?;

        let history = self.store.conversation_messages(ctx, conversation_id).await?;
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::new(ChatRole::System, SYSTEM_PROMPT));
        messages.extend(
            history
                .into_iter()
                .filter(|m| m.role != ChatRole::System)
                .map(|m| ChatMessage::new(m.role, m.content)),
        );

        let reply = completion.complete(&messages).await?;

        self.store
            .append_message(ctx, conversation_id, &ChatMessage::new(ChatRole::Assistant, reply.clone()))
            .await?;

        info!(user_id = %session.identity.id, conversation_id, "study assistant replied");
        Ok(reply)
    }
}
