//! Shared study content: resources, suggestions and community posts.
//!
//! Reads are public and handled by the hosted backend directly. Every write
//! goes through [`ContentStore`] carrying the caller's session, so the store
//! can reject non-admin writers on its own.

pub mod dispatch;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{SessionContext, StoreError};

pub use dispatch::{ActionOutcome, DispatchError, ProtectedAction, ProtectedActionDispatcher};

/// Resource category.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    PastPapers,
    Notes,
    Slides,
    BookLinks,
}

impl ResourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::PastPapers => "past_papers",
            ResourceCategory::Notes => "notes",
            ResourceCategory::Slides => "slides",
            ResourceCategory::BookLinks => "book_links",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of a suggestion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for SuggestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SuggestionStatus::Pending),
            "approved" => Ok(SuggestionStatus::Approved),
            "rejected" => Ok(SuggestionStatus::Rejected),
            other => Err(format!("unknown suggestion status '{other}'")),
        }
    }
}

/// Resource metadata as submitted by the upload form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    pub title: String,
    pub category: ResourceCategory,
    pub course_code: String,
    pub year: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub external_link: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub title: String,
    pub category: ResourceCategory,
    pub course_code: String,
    pub year: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub external_link: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub download_count: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Bytes to place in object storage before recording a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A stored object and its public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub public_url: String,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: ResourceCategory,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub status: Option<SuggestionStatus>,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Moderation decision applied to a suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionReview {
    pub status: SuggestionStatus,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommunityPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityPost {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Write side of the content relations and object storage.
///
/// Implementations must enforce their own authorization for `ctx`; a
/// rejection is reported as [`StoreError::Unauthorized`].
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_resource(
        &self,
        ctx: &SessionContext,
        resource: &NewResource,
        created_by: &str,
    ) -> Result<Resource, StoreError>;

    async fn delete_resource(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError>;

    async fn upload_file(
        &self,
        ctx: &SessionContext,
        path: &str,
        upload: &FileUpload,
    ) -> Result<StoredFile, StoreError>;

    /// Delete a stored object.
    async fn remove_file(&self, ctx: &SessionContext, path: &str) -> Result<(), StoreError>;

    async fn review_suggestion(
        &self,
        ctx: &SessionContext,
        id: &str,
        review: &SuggestionReview,
    ) -> Result<Suggestion, StoreError>;

    async fn delete_suggestion(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError>;

    async fn insert_post(
        &self,
        ctx: &SessionContext,
        post: &NewCommunityPost,
        created_by: &str,
    ) -> Result<CommunityPost, StoreError>;

    async fn delete_post(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError>;
}
