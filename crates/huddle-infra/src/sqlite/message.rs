//! SQLite message repository over the two chat table shapes.
//!
//! Implements `MessageRepository` from `huddle-core` using sqlx with split
//! read/write pools. Every query is addressed to an explicit variant; the
//! live one is detected by probing `chat_messages` and falling back to
//! `messages` when the probe errors.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use huddle_core::chat::repository::MessageRepository;
use huddle_types::error::RepositoryError;
use huddle_types::schema::{InsertPayload, MessageRow, SchemaVariant};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MessageRepository`.
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for the `chat_messages` shape.
struct ChatMessagesRow {
    id: String,
    group_id: String,
    user_id: Option<String>,
    message: String,
    message_type: String,
    created_at: String,
}

impl ChatMessagesRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            group_id: row.try_get("group_id")?,
            user_id: row.try_get("user_id")?,
            message: row.try_get("message")?,
            message_type: row.try_get("message_type")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message_row(self) -> Result<MessageRow, RepositoryError> {
        Ok(MessageRow {
            id: parse_uuid(&self.id, "message id")?,
            group_id: parse_uuid(&self.group_id, "group_id")?,
            user_id: self.user_id,
            message: Some(self.message),
            content: None,
            message_type: Some(self.message_type),
            attachment_url: None,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

/// Internal row type for the legacy `messages` shape.
struct MessagesRow {
    id: String,
    group_id: String,
    user_id: Option<String>,
    content: Option<String>,
    attachment_url: Option<String>,
    created_at: String,
}

impl MessagesRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            group_id: row.try_get("group_id")?,
            user_id: row.try_get("user_id")?,
            content: row.try_get("content")?,
            attachment_url: row.try_get("attachment_url")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message_row(self) -> Result<MessageRow, RepositoryError> {
        Ok(MessageRow {
            id: parse_uuid(&self.id, "message id")?,
            group_id: parse_uuid(&self.group_id, "group_id")?,
            user_id: self.user_id,
            message: None,
            content: self.content,
            message_type: None,
            attachment_url: self.attachment_url,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn map_rows(
    rows: &[sqlx::sqlite::SqliteRow],
    variant: SchemaVariant,
) -> Result<Vec<MessageRow>, RepositoryError> {
    let mut mapped = Vec::with_capacity(rows.len());
    for row in rows {
        let message_row = match variant {
            SchemaVariant::ChatMessages => ChatMessagesRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_message_row()?,
            SchemaVariant::Messages => MessagesRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_message_row()?,
        };
        mapped.push(message_row);
    }
    Ok(mapped)
}

// ---------------------------------------------------------------------------
// MessageRepository implementation
// ---------------------------------------------------------------------------

impl MessageRepository for SqliteMessageRepository {
    async fn detect_variant(&self) -> SchemaVariant {
        match sqlx::query("SELECT id FROM chat_messages LIMIT 1")
            .fetch_optional(&self.pool.reader)
            .await
        {
            Ok(_) => SchemaVariant::ChatMessages,
            Err(err) => {
                debug!(error = %err, "chat_messages probe failed, using messages table");
                SchemaVariant::Messages
            }
        }
    }

    async fn insert(
        &self,
        variant: SchemaVariant,
        payload: &InsertPayload,
    ) -> Result<MessageRow, RepositoryError> {
        match variant {
            SchemaVariant::ChatMessages => {
                sqlx::query(
                    r#"INSERT INTO chat_messages (id, group_id, user_id, message, message_type, created_at)
                       VALUES (?, ?, ?, ?, ?, ?)"#,
                )
                .bind(payload.id.to_string())
                .bind(payload.group_id.to_string())
                .bind(&payload.user_id)
                .bind(&payload.body)
                .bind(payload.message_type.as_deref().unwrap_or("text"))
                .bind(format_datetime(&payload.created_at))
                .execute(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

                Ok(MessageRow {
                    id: payload.id,
                    group_id: payload.group_id,
                    user_id: payload.user_id.clone(),
                    message: Some(payload.body.clone()),
                    content: None,
                    message_type: payload.message_type.clone(),
                    attachment_url: None,
                    created_at: payload.created_at,
                })
            }
            SchemaVariant::Messages => {
                sqlx::query(
                    r#"INSERT INTO messages (id, group_id, user_id, content, attachment_url, created_at)
                       VALUES (?, ?, ?, ?, ?, ?)"#,
                )
                .bind(payload.id.to_string())
                .bind(payload.group_id.to_string())
                .bind(&payload.user_id)
                .bind(&payload.body)
                .bind(&payload.attachment_url)
                .bind(format_datetime(&payload.created_at))
                .execute(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

                Ok(MessageRow {
                    id: payload.id,
                    group_id: payload.group_id,
                    user_id: payload.user_id.clone(),
                    message: None,
                    content: Some(payload.body.clone()),
                    message_type: None,
                    attachment_url: payload.attachment_url.clone(),
                    created_at: payload.created_at,
                })
            }
        }
    }

    async fn page_newest_first(
        &self,
        variant: SchemaVariant,
        group_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageRow>, RepositoryError> {
        let sql = format!(
            "SELECT * FROM {table} WHERE group_id = ? ORDER BY created_at DESC, id DESC LIMIT {limit} OFFSET {offset}",
            table = variant.table_name(),
        );

        let rows = sqlx::query(&sql)
            .bind(group_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows, variant)
    }

    async fn since(
        &self,
        variant: SchemaVariant,
        group_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<MessageRow>, RepositoryError> {
        let sql = format!(
            "SELECT * FROM {table} WHERE group_id = ? AND created_at >= ? ORDER BY created_at ASC, id ASC",
            table = variant.table_name(),
        );

        let rows = sqlx::query(&sql)
            .bind(group_id.to_string())
            .bind(format_datetime(&cutoff))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows, variant)
    }
}
