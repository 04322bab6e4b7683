//! Dual-schema mapping layer.
//!
//! Two incompatible chat table shapes coexist in production:
//!
//! - `chat_messages`: body in the `message` column, typed via
//!   `message_type`, attachments carried in the body.
//! - `messages`: body in the `content` column, attachments in a dedicated
//!   `attachment_url` column, no type column.
//!
//! The live shape is resolved once per operation by a cheap existence probe
//! against `chat_messages`; a probe failure selects `messages`. All
//! translation between the logical [`ChatMessage`] and either shape happens
//! here -- call sites never branch on column names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::message::{AuthorRef, ChatMessage, MessageKind};

/// Which of the two chat table shapes an operation is addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// The `chat_messages` table (probed first).
    ChatMessages,
    /// The `messages` table (fallback).
    Messages,
}

impl SchemaVariant {
    /// The table this variant addresses.
    pub fn table_name(&self) -> &'static str {
        match self {
            SchemaVariant::ChatMessages => "chat_messages",
            SchemaVariant::Messages => "messages",
        }
    }

    /// The column holding the message body in this variant.
    pub fn body_column(&self) -> &'static str {
        match self {
            SchemaVariant::ChatMessages => "message",
            SchemaVariant::Messages => "content",
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A raw chat row as it exists in one of the two tables, before
/// normalization. Carried by change-feed notifications so listeners see
/// exactly what was inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Option<String>,
    /// `chat_messages.message` -- set only for that variant.
    pub message: Option<String>,
    /// `messages.content` -- set only for that variant.
    pub content: Option<String>,
    /// `chat_messages.message_type` -- absent on the `messages` variant.
    pub message_type: Option<String>,
    /// `messages.attachment_url` -- absent on the `chat_messages` variant.
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    /// Normalize this raw row into the logical message model.
    ///
    /// Body resolution prefers whichever column the variant owns; the kind
    /// defaults to `text` where the variant has no type column, except that
    /// a populated `attachment_url` marks the row as an attachment.
    pub fn normalize(self, variant: SchemaVariant) -> ChatMessage {
        let author = AuthorRef::from_column_value(self.user_id.as_deref());

        let (body, kind, attachment_url) = match variant {
            SchemaVariant::ChatMessages => {
                let body = self.message.or(self.content).unwrap_or_default();
                let kind = self
                    .message_type
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default();
                // This variant carries attachment URLs in the body.
                let attachment_url = match kind {
                    MessageKind::Attachment => Some(body.clone()),
                    _ => None,
                };
                (body, kind, attachment_url)
            }
            SchemaVariant::Messages => {
                let body = self.content.or(self.message).unwrap_or_default();
                let (kind, attachment_url) = match self.attachment_url {
                    Some(url) => (MessageKind::Attachment, Some(url)),
                    None => (MessageKind::Text, None),
                };
                (body, kind, attachment_url)
            }
        };

        ChatMessage {
            id: self.id,
            group_id: self.group_id,
            author,
            body,
            kind,
            created_at: self.created_at,
            attachment_url,
            author_profile: None,
        }
    }
}

/// The column values to write for a new message, already mapped to one
/// variant's field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPayload {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Option<String>,
    /// Goes into the variant's body column (`message` or `content`).
    pub body: String,
    /// `message_type` value -- `None` for the `messages` variant.
    pub message_type: Option<String>,
    /// `attachment_url` value -- `None` for the `chat_messages` variant.
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Map a logical new message onto one variant's columns.
///
/// The inverse of [`MessageRow::normalize`] for freshly assigned rows:
/// for `chat_messages` the attachment URL rides in the body with
/// `message_type = 'attachment'`; for `messages` it gets its own column.
pub fn to_insert_payload(
    variant: SchemaVariant,
    id: Uuid,
    group_id: Uuid,
    author: AuthorRef,
    body: &str,
    kind: MessageKind,
    created_at: DateTime<Utc>,
) -> InsertPayload {
    match variant {
        SchemaVariant::ChatMessages => InsertPayload {
            id,
            group_id,
            user_id: author.as_column_value(),
            body: body.to_string(),
            message_type: Some(kind.to_string()),
            attachment_url: None,
            created_at,
        },
        SchemaVariant::Messages => InsertPayload {
            id,
            group_id,
            user_id: author.as_column_value(),
            body: body.to_string(),
            message_type: None,
            attachment_url: match kind {
                MessageKind::Attachment => Some(body.to_string()),
                _ => None,
            },
            created_at,
        },
    }
}
