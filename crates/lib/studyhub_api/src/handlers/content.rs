//! Protected content mutations: gate first, then the dispatcher.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use studyhub_core::auth::SessionContext;
use studyhub_core::content::{
    ActionOutcome, CommunityPost, FileUpload, NewCommunityPost, NewResource, ProtectedAction,
    Resource, Suggestion, SuggestionReview,
};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::AdminJson;
use crate::models::{DeletedResponse, UploadResourceRequest};

/// Gate the caller, then dispatch `action` with the fresh decision.
async fn run(state: &AppState, ctx: &SessionContext, action: ProtectedAction) -> AppResult<ActionOutcome> {
    let decision = state.gate.check(ctx).await;
    if !decision.is_authorized() {
        return Err(AppError::SessionRequired(decision));
    }
    Ok(state.dispatcher.dispatch(ctx, &decision, action).await?)
}

fn unexpected(outcome: ActionOutcome) -> AppError {
    AppError::Internal(format!("unexpected action outcome: {outcome:?}"))
}

fn validate_resource(resource: &NewResource) -> AppResult<()> {
    if resource.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".into()));
    }
    if resource.course_code.trim().is_empty() {
        return Err(AppError::Validation("course_code is required".into()));
    }
    Ok(())
}

fn deleted(outcome: ActionOutcome) -> AppResult<Json<DeletedResponse>> {
    match outcome {
        ActionOutcome::ResourceDeleted { id }
        | ActionOutcome::SuggestionDeleted { id }
        | ActionOutcome::PostDeleted { id } => Ok(Json(DeletedResponse { success: true, id })),
        other => Err(unexpected(other)),
    }
}

/// `POST /admin/resources`: record a resource (external link or
/// already-uploaded file).
pub async fn create_resource_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    AdminJson(body): AdminJson<NewResource>,
) -> AppResult<(StatusCode, Json<Resource>)> {
    validate_resource(&body)?;
    match run(&state, &ctx, ProtectedAction::CreateResource(body)).await? {
        ActionOutcome::ResourceCreated(resource) => Ok((StatusCode::CREATED, Json(resource))),
        other => Err(unexpected(other)),
    }
}

/// `POST /admin/resources/upload`: store a file and record its resource.
pub async fn upload_resource_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    AdminJson(body): AdminJson<UploadResourceRequest>,
) -> AppResult<(StatusCode, Json<Resource>)> {
    validate_resource(&body.resource)?;
    if body.file_name.trim().is_empty() {
        return Err(AppError::Validation("file_name is required".into()));
    }
    let bytes = STANDARD
        .decode(body.data.trim())
        .map_err(|e| AppError::Validation(format!("data is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("file is empty".into()));
    }

    let action = ProtectedAction::UploadResource {
        resource: body.resource,
        file: FileUpload {
            file_name: body.file_name,
            content_type: body.content_type,
            bytes,
        },
    };
    match run(&state, &ctx, action).await? {
        ActionOutcome::ResourceCreated(resource) => Ok((StatusCode::CREATED, Json(resource))),
        other => Err(unexpected(other)),
    }
}

/// `DELETE /admin/resources/{id}`
pub async fn delete_resource_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    deleted(run(&state, &ctx, ProtectedAction::DeleteResource { id }).await?)
}

/// `PATCH /admin/suggestions/{id}`: approve or reject a suggestion.
pub async fn review_suggestion_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    AdminJson(review): AdminJson<SuggestionReview>,
) -> AppResult<Json<Suggestion>> {
    match run(&state, &ctx, ProtectedAction::ReviewSuggestion { id, review }).await? {
        ActionOutcome::SuggestionReviewed(suggestion) => Ok(Json(suggestion)),
        other => Err(unexpected(other)),
    }
}

/// `DELETE /admin/suggestions/{id}`
pub async fn delete_suggestion_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    deleted(run(&state, &ctx, ProtectedAction::DeleteSuggestion { id }).await?)
}

/// `POST /admin/community-posts`
pub async fn create_post_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    AdminJson(body): AdminJson<NewCommunityPost>,
) -> AppResult<(StatusCode, Json<CommunityPost>)> {
    if body.title.trim().is_empty() || body.content.trim().is_empty() {
        return Err(AppError::Validation("title and content are required".into()));
    }
    match run(&state, &ctx, ProtectedAction::CreateCommunityPost(body)).await? {
        ActionOutcome::PostCreated(post) => Ok((StatusCode::CREATED, Json(post))),
        other => Err(unexpected(other)),
    }
}

/// `DELETE /admin/community-posts/{id}`
pub async fn delete_post_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    deleted(run(&state, &ctx, ProtectedAction::DeleteCommunityPost { id }).await?)
}
