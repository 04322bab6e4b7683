//! Group chat HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/chat/{group_id}/messages - Send a message (bot-aware)
//! - GET  /api/v1/chat/{group_id}/messages - Page through messages
//! - GET  /api/v1/chat/{group_id}/recent   - Messages from the last 24h

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use huddle_core::chat::repository::GroupRepository;
use huddle_core::chat::store::MAX_BODY_CHARS;
use huddle_core::sync::view::parse_bot_query;
use huddle_types::error::ChatError;
use huddle_types::message::{AuthorRef, ChatMessage, MessageKind};
use huddle_types::profile::Profile;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    pub message_type: Option<String>,
}

/// Query parameters for message listing.
#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Ensure the group exists and the caller belongs to it.
async fn require_member(state: &AppState, group_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let summary = state
        .groups
        .get_summary(&group_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or(AppError::NotFound("Group not found"))?;

    if !summary.members.contains(&user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Parse and validate the request's message kind.
fn parse_kind(message_type: Option<&str>) -> Result<MessageKind, AppError> {
    match message_type {
        None => Ok(MessageKind::Text),
        Some(raw) => raw
            .parse::<MessageKind>()
            .map_err(|_| AppError::Chat(ChatError::InvalidKind(raw.to_string()))),
    }
}

/// Whether this send should trigger the assistant, and with what query.
///
/// Only the spaced prefix triggers on this route; a bare "@bot" is an
/// ordinary message here. The prefix is stripped even when the kind is
/// already `bot_query`.
fn bot_trigger(kind: MessageKind, message: &str) -> Option<String> {
    if message.to_lowercase().starts_with("@bot ") {
        return parse_bot_query(message);
    }
    if kind == MessageKind::BotQuery {
        return Some(message.to_string());
    }
    None
}

/// POST /api/v1/chat/{group_id}/messages - Send a message to a group chat.
pub async fn send_message(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Path(group_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let kind = parse_kind(body.message_type.as_deref())?;
    if body.message.trim().is_empty() || body.message.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::Validation(format!(
            "message must be between 1 and {MAX_BODY_CHARS} characters"
        )));
    }

    require_member(&state, group_id, user_id).await?;

    let user_message = state
        .store
        .send(group_id, AuthorRef::User(user_id), &body.message, kind)
        .await?;

    if let Some(query) = bot_trigger(kind, &body.message) {
        let reply = state.pipeline.generate_response(group_id, &query).await;

        // The assistant's answer lands in the same timeline as a system
        // notice; its failure must not fail the user's send.
        match state
            .store
            .send(group_id, AuthorRef::None, &reply, MessageKind::System)
            .await
        {
            Ok(mut bot_message) => {
                bot_message.author_profile = Some(Profile::bot());
                return Ok((
                    StatusCode::CREATED,
                    Json(json!({
                        "userMessage": user_message,
                        "botMessage": bot_message,
                    })),
                ));
            }
            Err(err) => {
                warn!(group_id = %group_id, error = %err, "failed to save assistant reply, returning user message only");
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(&user_message).map_err(|e| AppError::Internal(e.to_string()))?),
    ))
}

/// GET /api/v1/chat/{group_id}/messages - Page through a group's messages.
pub async fn get_messages(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Path(group_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Value>, AppError> {
    require_member(&state, group_id, user_id).await?;

    let page = state
        .store
        .list(group_id, query.limit, query.offset)
        .await?;

    Ok(Json(json!({
        "messages": page.messages,
        "group_id": group_id,
        "count": page.messages.len(),
        "limit": page.limit,
        "offset": page.offset,
    })))
}

/// GET /api/v1/chat/{group_id}/recent - Messages from the last 24 hours.
pub async fn get_recent(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_member(&state, group_id, user_id).await?;

    let messages: Vec<ChatMessage> = state.store.list_recent(group_id).await?;

    Ok(Json(json!({
        "messages": messages,
        "group_id": group_id,
        "count": messages.len(),
        "timeframe": "last 24 hours",
    })))
}
