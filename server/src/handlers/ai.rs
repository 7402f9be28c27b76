use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ai::{ChatTurn, Provider};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::validation::{validate_not_blank, ValidatedJson};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AiChatRequest {
    #[validate(
        custom = "validate_not_blank",
        length(max = 4000, message = "Message must be at most 4000 characters")
    )]
    pub message: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "History is limited to 20 turns"))]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AiChatResponse {
    pub reply: String,
    pub provider: Provider,
}

/// POST /api/ai/chat
///
/// Always answers 200; provider failures end in the canned reply.
pub async fn chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<AiChatRequest>,
) -> Result<Json<AiChatResponse>, ApiError> {
    let (reply, provider) = state.ai.chat(req.message.trim(), &req.history).await;
    tracing::info!(user_id = %auth.id, ?provider, "AI chat answered");

    Ok(Json(AiChatResponse { reply, provider }))
}
