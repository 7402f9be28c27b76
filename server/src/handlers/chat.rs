use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::access::can_chat;
use crate::auth::AuthUser;
use crate::db::{Database, Filter};
use crate::error::ApiError;
use crate::models::{room_id, ChatMessage, Role, User, UserProfile};
use crate::notify::{preview, PushMessage};
use crate::validation::{validate_not_blank, ValidatedJson};
use crate::AppState;

const PUSH_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[validate(length(min = 1, message = "Receiver is required"))]
    pub receiver_id: String,
    #[validate(
        custom = "validate_not_blank",
        length(max = 2000, message = "Message must be at most 2000 characters")
    )]
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessages {
    pub room_id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadSummary {
    pub total: usize,
    pub by_sender: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactList {
    pub contacts: Vec<UserProfile>,
}

async fn load_user(db: &Database, id: &str) -> Result<User, ApiError> {
    db.find::<User>(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// Both ends of a conversation, checked for chat permission
async fn chat_pair(db: &Database, me: &AuthUser, other_id: &str) -> Result<(User, User), ApiError> {
    let me = load_user(db, &me.id).await?;
    let other = load_user(db, other_id).await?;
    if !can_chat(&me, &other) {
        tracing::warn!(user_id = %me.id(), other_id, "chat not permitted");
        return Err(ApiError::Forbidden(
            "You cannot chat with this user".to_string(),
        ));
    }
    Ok((me, other))
}

pub(crate) async fn unread_for(db: &Database, user_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
    Ok(db
        .find_by::<ChatMessage>(&[
            Filter::eq("receiverId", user_id),
            Filter::eq("read", false),
        ])
        .await?)
}

/// POST /api/chat/messages
pub async fn send(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let (sender, receiver) = chat_pair(&state.db, &auth, &req.receiver_id).await?;

    let message = ChatMessage::new(sender.id(), receiver.id(), req.body.trim());
    let message = state.db.create(&message).await?;
    tracing::info!(message_id = ?message.id, room_id = %message.room_id, "chat message sent");

    if let Some(token) = receiver.fcm_token.clone() {
        let data = BTreeMap::from([
            ("type".to_string(), "chat".to_string()),
            ("roomId".to_string(), message.room_id.clone()),
            ("senderId".to_string(), sender.id().to_string()),
        ]);
        state.notifier.spawn_send(
            token,
            PushMessage {
                title: sender.name.clone(),
                body: preview(&message.body, PUSH_PREVIEW_CHARS),
                data,
            },
        );
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/chat/rooms/:other_id/messages
pub async fn room_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(other_id): Path<String>,
) -> Result<Json<RoomMessages>, ApiError> {
    chat_pair(&state.db, &auth, &other_id).await?;

    let room_id = room_id(&auth.id, &other_id);
    let mut messages = state
        .db
        .find_by::<ChatMessage>(&[Filter::eq("roomId", room_id.as_str())])
        .await?;
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Ok(Json(RoomMessages { room_id, messages }))
}

/// POST /api/chat/rooms/:other_id/read
pub async fn mark_room_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(other_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pending = state
        .db
        .find_by::<ChatMessage>(&[
            Filter::eq("senderId", other_id.as_str()),
            Filter::eq("receiverId", auth.id.as_str()),
            Filter::eq("read", false),
        ])
        .await?;

    let mut updated = 0;
    for message in pending {
        let Some(id) = message.id else { continue };
        if state
            .db
            .update::<ChatMessage, _>(&id, &json!({ "read": true }))
            .await?
            .is_some()
        {
            updated += 1;
        }
    }
    tracing::debug!(user_id = %auth.id, other_id = %other_id, updated, "room marked read");

    Ok(Json(json!({ "updated": updated })))
}

/// PATCH /api/chat/messages/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ChatMessage>, ApiError> {
    let message = state
        .db
        .find::<ChatMessage>(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message"))?;
    if message.receiver_id != auth.id {
        tracing::warn!(user_id = %auth.id, message_id = %id, "not the message receiver");
        return Err(ApiError::Forbidden(
            "Only the receiver can mark a message as read".to_string(),
        ));
    }
    if message.read {
        return Ok(Json(message));
    }

    let updated = state
        .db
        .update::<ChatMessage, _>(&id, &json!({ "read": true }))
        .await?
        .ok_or_else(|| ApiError::not_found("Message"))?;

    Ok(Json(updated))
}

/// GET /api/chat/unread
pub async fn unread(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UnreadSummary>, ApiError> {
    let messages = unread_for(&state.db, &auth.id).await?;

    let mut by_sender = BTreeMap::new();
    for message in &messages {
        *by_sender.entry(message.sender_id.clone()).or_insert(0) += 1;
    }

    Ok(Json(UnreadSummary {
        total: messages.len(),
        by_sender,
    }))
}

/// GET /api/chat/contacts
pub async fn contacts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ContactList>, ApiError> {
    let me = load_user(&state.db, &auth.id).await?;

    let candidates = match me.role {
        Role::Doctor => {
            state
                .db
                .find_by::<User>(&[
                    Filter::eq("role", Role::Patient.as_str()),
                    Filter::eq("doctorId", me.id()),
                ])
                .await?
        }
        Role::Patient => match me.doctor_id.as_deref() {
            Some(doctor_id) => state.db.find::<User>(doctor_id).await?.into_iter().collect(),
            None => Vec::new(),
        },
        Role::Admin => state.db.find_by::<User>(&[]).await?,
    };

    let mut contacts: Vec<UserProfile> = candidates
        .iter()
        .filter(|u| can_chat(&me, u))
        .map(User::profile)
        .collect();
    contacts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    Ok(Json(ContactList { contacts }))
}
