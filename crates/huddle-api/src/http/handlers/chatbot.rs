//! Chatbot query handler.
//!
//! POST /api/v1/chatbot/query always answers 200 after validation: the
//! pipeline absorbs provider and store failures and degrades the payload
//! instead. The route layer must never translate a pipeline problem into
//! an HTTP error.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use huddle_core::bot::BotReply;
use huddle_core::chat::store::MAX_BODY_CHARS;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

/// Request body for a chatbot query.
#[derive(Debug, Deserialize)]
pub struct ChatbotQueryRequest {
    #[serde(rename = "groupId")]
    pub group_id: Uuid,
    pub message: String,
}

/// POST /api/v1/chatbot/query - Ask the assistant about a group.
pub async fn query(
    State(state): State<AppState>,
    Authenticated(_user_id): Authenticated,
    Json(body): Json<ChatbotQueryRequest>,
) -> Result<Json<BotReply>, AppError> {
    if body.message.trim().is_empty() || body.message.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::Validation(format!(
            "message must be between 1 and {MAX_BODY_CHARS} characters"
        )));
    }

    let reply = state.pipeline.respond(body.group_id, &body.message).await;
    Ok(Json(reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_camel_case_group_id() {
        let body: ChatbotQueryRequest = serde_json::from_str(
            r#"{"groupId": "0189f6a5-7b1a-7c3d-9e4f-1a2b3c4d5e6f", "message": "hi"}"#,
        )
        .unwrap();
        assert_eq!(body.message, "hi");
    }
}
