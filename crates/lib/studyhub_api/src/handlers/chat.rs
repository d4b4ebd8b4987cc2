//! Study assistant RPC.

use axum::extract::State;
use axum::{Extension, Json};

use studyhub_core::auth::SessionContext;

use crate::AppState;
use crate::error::FunctionError;
use crate::extract::FunctionJson;
use crate::models::{StudyChatRequest, StudyChatResponse};

/// `POST /functions/v1/study-chat`: reply to the latest message of a
/// conversation owned by the caller.
pub async fn study_chat_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    FunctionJson(body): FunctionJson<StudyChatRequest>,
) -> Result<Json<StudyChatResponse>, FunctionError> {
    let message = state.assistant.reply(&ctx, &body.conversation_id).await?;
    Ok(Json(StudyChatResponse { message }))
}
