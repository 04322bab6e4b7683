//! Message store service: validation, ordering, and pagination semantics.
//!
//! Every send publishes a row-insert notification on the change-feed hub
//! after the row is durably stored, mirroring how remote clients learn of
//! new rows.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use huddle_types::error::ChatError;
use huddle_types::message::{AuthorRef, ChatMessage, MessageKind};
use huddle_types::schema::{SchemaVariant, to_insert_payload};

use crate::chat::repository::{MessageRepository, ProfileRepository};
use crate::identity::IdentityResolver;
use crate::sync::feed::{FeedEvent, FeedHub};

/// Maximum message body length, in characters.
pub const MAX_BODY_CHARS: usize = 1000;

/// Default page size for message listing.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Maximum page size for message listing.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// How far back `list_recent` looks.
const RECENT_WINDOW_HOURS: i64 = 24;

/// A chronological page of messages.
#[derive(Debug)]
pub struct MessagePage {
    /// Oldest-to-newest within the page.
    pub messages: Vec<ChatMessage>,
    pub limit: i64,
    pub offset: i64,
}

/// Persistence and retrieval of messages for a group.
///
/// Generic over the message repository and the profile store behind the
/// identity resolver; huddle-core never depends on huddle-infra.
pub struct MessageStore<M: MessageRepository, P: ProfileRepository> {
    messages: M,
    resolver: Arc<IdentityResolver<P>>,
    feed: FeedHub,
}

impl<M: MessageRepository, P: ProfileRepository> MessageStore<M, P> {
    /// Create a store over the given repository, resolver, and feed hub.
    pub fn new(messages: M, resolver: Arc<IdentityResolver<P>>, feed: FeedHub) -> Self {
        Self {
            messages,
            resolver,
            feed,
        }
    }

    /// The change-feed hub this store publishes to.
    pub fn feed(&self) -> &FeedHub {
        &self.feed
    }

    /// The identity resolver used for read-time profile joins.
    pub fn resolver(&self) -> &Arc<IdentityResolver<P>> {
        &self.resolver
    }

    /// Probe which schema variant is live.
    pub async fn detect_variant(&self) -> SchemaVariant {
        self.messages.detect_variant().await
    }

    /// Validate and persist a message, returning the stored row with its
    /// author profile joined best-effort.
    ///
    /// The body is checked before any I/O: empty/whitespace-only bodies
    /// and bodies over [`MAX_BODY_CHARS`] characters are rejected.
    pub async fn send(
        &self,
        group_id: Uuid,
        author: AuthorRef,
        body: &str,
        kind: MessageKind,
    ) -> Result<ChatMessage, ChatError> {
        validate_body(body)?;

        let variant = self.messages.detect_variant().await;
        let payload = to_insert_payload(
            variant,
            Uuid::now_v7(),
            group_id,
            author,
            body,
            kind,
            Utc::now(),
        );

        let row = self.messages.insert(variant, &payload).await.map_err(|e| {
            warn!(group_id = %group_id, variant = %variant, error = %e, "message insert failed");
            ChatError::SendFailed
        })?;

        // Remote clients learn of the row through the feed; local views
        // through the optimistic append and the echo channel.
        self.feed.publish(FeedEvent {
            variant,
            row: row.clone(),
        });

        let mut message = row.normalize(variant);
        message.author_profile = self.resolver.resolve(message.author).await;
        Ok(message)
    }

    /// One page of a group's messages.
    ///
    /// `limit` in `[1, 100]`, default 50; `offset >= 0`, default 0.
    /// Rows are fetched newest-first and reversed, so the returned page is
    /// chronological. Either the full page or an error, never a partial.
    pub async fn list(
        &self,
        group_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<MessagePage, ChatError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(ChatError::InvalidLimit {
                max: MAX_PAGE_LIMIT,
            });
        }
        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(ChatError::InvalidOffset);
        }

        let variant = self.messages.detect_variant().await;
        let rows = self
            .messages
            .page_newest_first(variant, &group_id, limit, offset)
            .await
            .map_err(|e| {
                warn!(group_id = %group_id, variant = %variant, error = %e, "message page fetch failed");
                ChatError::FetchFailed
            })?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows.into_iter().rev() {
            messages.push(self.normalize_with_profile(row, variant).await);
        }

        Ok(MessagePage {
            messages,
            limit,
            offset,
        })
    }

    /// A group's messages from the last 24 hours, chronological.
    pub async fn list_recent(&self, group_id: Uuid) -> Result<Vec<ChatMessage>, ChatError> {
        let cutoff = Utc::now() - Duration::hours(RECENT_WINDOW_HOURS);
        let variant = self.messages.detect_variant().await;
        let rows = self
            .messages
            .since(variant, &group_id, cutoff)
            .await
            .map_err(|e| {
                warn!(group_id = %group_id, variant = %variant, error = %e, "recent message fetch failed");
                ChatError::FetchFailed
            })?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            messages.push(self.normalize_with_profile(row, variant).await);
        }
        Ok(messages)
    }

    async fn normalize_with_profile(
        &self,
        row: huddle_types::schema::MessageRow,
        variant: SchemaVariant,
    ) -> ChatMessage {
        let mut message = row.normalize(variant);
        message.author_profile = self.resolver.resolve(message.author).await;
        message
    }
}

/// Reject empty, whitespace-only, and oversized bodies.
pub fn validate_body(body: &str) -> Result<(), ChatError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || body.chars().count() > MAX_BODY_CHARS {
        return Err(ChatError::InvalidBody {
            max: MAX_BODY_CHARS,
        });
    }
    Ok(())
}
