//! Chat message domain types.
//!
//! `ChatMessage` is the schema-normalized logical message: whichever of the
//! two historical table shapes a row came from, it reaches the rest of the
//! system in this one form. The raw per-table shapes live in [`crate::schema`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::profile::Profile;

/// Reserved author value for rows written on behalf of the assistant.
pub const BOT_AUTHOR_SENTINEL: &str = "bot";

/// Who authored a message.
///
/// Stored in the `user_id` column as the uuid string, the literal `"bot"`,
/// or SQL NULL (pure system notices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorRef {
    /// A human member, by profile id.
    User(Uuid),
    /// The assistant's reserved sentinel identity.
    Bot,
    /// No author (system notice).
    None,
}

impl AuthorRef {
    /// The value persisted in the `user_id` column, if any.
    pub fn as_column_value(&self) -> Option<String> {
        match self {
            AuthorRef::User(id) => Some(id.to_string()),
            AuthorRef::Bot => Some(BOT_AUTHOR_SENTINEL.to_string()),
            AuthorRef::None => None,
        }
    }

    /// Parse a raw `user_id` column value.
    pub fn from_column_value(value: Option<&str>) -> Self {
        match value {
            None => AuthorRef::None,
            Some(BOT_AUTHOR_SENTINEL) => AuthorRef::Bot,
            Some(s) => match Uuid::parse_str(s) {
                Ok(id) => AuthorRef::User(id),
                // Unknown non-uuid authors render as system notices.
                Err(_) => AuthorRef::None,
            },
        }
    }

    /// Whether this author is the local viewer.
    pub fn is_user(&self, viewer: &Uuid) -> bool {
        matches!(self, AuthorRef::User(id) if id == viewer)
    }
}

impl Default for AuthorRef {
    fn default() -> Self {
        AuthorRef::None
    }
}

impl Serialize for AuthorRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AuthorRef::User(id) => serializer.serialize_some(&id.to_string()),
            AuthorRef::Bot => serializer.serialize_some(BOT_AUTHOR_SENTINEL),
            AuthorRef::None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for AuthorRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(AuthorRef::from_column_value(raw.as_deref()))
    }
}

/// Kind of chat message.
///
/// The REST surface additionally accepts `image` as a legacy alias for
/// `attachment`; the domain enum itself carries only the four kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    System,
    BotQuery,
    #[serde(alias = "image")]
    Attachment,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::System => write!(f, "system"),
            MessageKind::BotQuery => write!(f, "bot_query"),
            MessageKind::Attachment => write!(f, "attachment"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "system" => Ok(MessageKind::System),
            "bot_query" => Ok(MessageKind::BotQuery),
            // Legacy rows tagged the attachment kind as 'image'.
            "attachment" | "image" => Ok(MessageKind::Attachment),
            other => Err(format!("invalid message kind: '{other}'")),
        }
    }
}

/// A schema-normalized chat message.
///
/// Created once (by a human send or by the bot pipeline), never mutated,
/// never hard-deleted by this core. `id` is the sole deduplication key;
/// `(created_at, id)` is the total order within a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    #[serde(rename = "user_id", default)]
    pub author: AuthorRef,
    /// Logical body text. Variant `chat_messages` stores it in the
    /// `message` column, variant `messages` in `content`.
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "message_type", default)]
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    /// Present only for `kind = attachment`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    /// Denormalized author profile, joined at read time. Never persisted
    /// with the row; safe to cache by author id.
    #[serde(rename = "profiles", skip_serializing_if = "Option::is_none")]
    pub author_profile: Option<Profile>,
}
