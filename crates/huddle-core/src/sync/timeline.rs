//! The reconciliation engine: one ordered, deduplicated message list.
//!
//! All message-arrival sources merge here. The timeline is the single
//! writer of the in-memory list; merging is idempotent and keyed solely by
//! the server-assigned message id, so there is no optimistic-id rewrite
//! step. Once inserted, entries are never reordered.

use std::collections::HashSet;

use uuid::Uuid;

use huddle_types::message::ChatMessage;

/// Default page size for initial and older-page fetches.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Ordered, duplicate-free message list with a backward-pagination cursor.
#[derive(Debug)]
pub struct Timeline {
    messages: Vec<ChatMessage>,
    seen: HashSet<Uuid>,
    /// Offset cursor for the next older-page fetch.
    cursor: usize,
    has_more: bool,
    page_size: usize,
}

impl Timeline {
    /// Create an empty timeline expecting pages of `page_size`.
    pub fn new(page_size: usize) -> Self {
        Self {
            messages: Vec::new(),
            seen: HashSet::new(),
            cursor: 0,
            has_more: false,
            page_size,
        }
    }

    /// Replace the list wholesale with the first fetched page
    /// (chronological). Seeds `has_more` from whether the page was full.
    pub fn apply_initial_page(&mut self, page: Vec<ChatMessage>) {
        self.has_more = page.len() == self.page_size;
        self.cursor = page.len();
        self.seen = page.iter().map(|m| m.id).collect();
        self.messages = page;
    }

    /// Prepend an older page (chronological) and advance the cursor.
    pub fn apply_older_page(&mut self, page: Vec<ChatMessage>) {
        self.has_more = page.len() == self.page_size;
        self.cursor += page.len();

        let mut merged = Vec::with_capacity(page.len() + self.messages.len());
        for msg in page {
            if self.seen.insert(msg.id) {
                merged.push(msg);
            }
        }
        merged.append(&mut self.messages);
        self.messages = merged;
    }

    /// Merge a message arriving from the feed, the echo channel, or the
    /// bot pipeline. Idempotent: a known id is a no-op; a new one is
    /// appended at the tail (producers already emit in causal order for a
    /// given group).
    ///
    /// Returns whether the message was actually appended.
    pub fn apply_incoming(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Append a locally sent message immediately. The store call is
    /// synchronous from the caller's perspective and returns the
    /// authoritative id, so this is the same idempotent merge as
    /// [`Timeline::apply_incoming`].
    pub fn apply_optimistic(&mut self, message: ChatMessage) -> bool {
        self.apply_incoming(message)
    }

    /// The current ordered list.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether an older page may still exist.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Offset to pass to the next older-page fetch.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of messages currently held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the timeline holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use huddle_types::message::{AuthorRef, MessageKind};

    fn msg(minutes_ago: i64) -> ChatMessage {
        ChatMessage {
            id: Uuid::now_v7(),
            group_id: Uuid::nil(),
            author: AuthorRef::User(Uuid::now_v7()),
            body: format!("m-{minutes_ago}"),
            kind: MessageKind::Text,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            attachment_url: None,
            author_profile: None,
        }
    }

    #[test]
    fn initial_page_replaces_and_seeds_has_more() {
        let mut tl = Timeline::new(3);
        tl.apply_incoming(msg(99));

        tl.apply_initial_page(vec![msg(3), msg(2), msg(1)]);
        assert_eq!(tl.len(), 3);
        assert!(tl.has_more());
        assert_eq!(tl.cursor(), 3);

        // Short page: no more history.
        tl.apply_initial_page(vec![msg(1)]);
        assert!(!tl.has_more());
        assert_eq!(tl.cursor(), 1);
    }

    #[test]
    fn incoming_is_idempotent_by_id() {
        let mut tl = Timeline::default();
        let m = msg(0);

        assert!(tl.apply_incoming(m.clone()));
        assert!(!tl.apply_incoming(m.clone()));
        assert!(!tl.apply_incoming(m));

        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn incoming_appends_in_arrival_order() {
        let mut tl = Timeline::default();
        let first = msg(5);
        let second = msg(3);
        let third = msg(4);

        tl.apply_incoming(first.clone());
        tl.apply_incoming(second.clone());
        tl.apply_incoming(third.clone());

        let ids: Vec<Uuid> = tl.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn optimistic_then_echo_of_same_id_yields_one_entry() {
        let mut tl = Timeline::default();
        let m = msg(0);

        assert!(tl.apply_optimistic(m.clone()));
        // The echo channel and the feed both redeliver the same row.
        assert!(!tl.apply_incoming(m.clone()));
        assert!(!tl.apply_incoming(m));

        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn older_page_prepends_before_current_earliest() {
        let mut tl = Timeline::new(2);
        let recent = vec![msg(2), msg(1)];
        let recent_first_id = recent[0].id;
        tl.apply_initial_page(recent);

        let older = vec![msg(10), msg(9)];
        let older_ids: Vec<Uuid> = older.iter().map(|m| m.id).collect();
        tl.apply_older_page(older);

        assert_eq!(tl.cursor(), 4);
        assert!(tl.has_more());
        let ids: Vec<Uuid> = tl.messages().iter().map(|m| m.id).collect();
        assert_eq!(&ids[..2], &older_ids[..]);
        assert_eq!(ids[2], recent_first_id);
    }

    #[test]
    fn older_page_drops_rows_already_present() {
        let mut tl = Timeline::new(2);
        let overlap = msg(5);
        tl.apply_initial_page(vec![overlap.clone(), msg(1)]);

        tl.apply_older_page(vec![msg(9), overlap]);
        assert_eq!(tl.len(), 3);
        // Cursor still advances by the fetched page length.
        assert_eq!(tl.cursor(), 4);
    }

    #[test]
    fn short_older_page_clears_has_more() {
        let mut tl = Timeline::new(2);
        tl.apply_initial_page(vec![msg(2), msg(1)]);
        assert!(tl.has_more());

        tl.apply_older_page(vec![msg(3)]);
        assert!(!tl.has_more());
        assert_eq!(tl.cursor(), 3);
    }
}
