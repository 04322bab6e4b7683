//! Repository trait definitions for chat storage and its read-only
//! collaborators.
//!
//! Implementations live in huddle-infra (e.g. `SqliteMessageRepository`).
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use huddle_types::error::RepositoryError;
use huddle_types::group::{EventSummary, GroupSummary, PollSummary};
use huddle_types::profile::Profile;
use huddle_types::schema::{InsertPayload, MessageRow, SchemaVariant};

/// Repository trait for dual-schema chat message persistence.
///
/// Every operation is addressed to an explicit [`SchemaVariant`]; the
/// variant is resolved by [`MessageRepository::detect_variant`] once per
/// operation, never assumed.
pub trait MessageRepository: Send + Sync {
    /// Detect which table shape is live via a cheap existence probe
    /// against `chat_messages`. A probe failure selects the `messages`
    /// fallback; detection itself never errors.
    fn detect_variant(&self) -> impl std::future::Future<Output = SchemaVariant> + Send;

    /// Insert a pre-mapped row and return it as stored.
    fn insert(
        &self,
        variant: SchemaVariant,
        payload: &InsertPayload,
    ) -> impl std::future::Future<Output = Result<MessageRow, RepositoryError>> + Send;

    /// One page of a group's messages, newest first.
    fn page_newest_first(
        &self,
        variant: SchemaVariant,
        group_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<MessageRow>, RepositoryError>> + Send;

    /// All of a group's messages at or after `cutoff`, oldest first.
    fn since(
        &self,
        variant: SchemaVariant,
        group_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<MessageRow>, RepositoryError>> + Send;
}

/// Read/create access to the external profile store.
///
/// Profile lifecycle is owned elsewhere; creation exists only for the
/// bot's own identity row.
pub trait ProfileRepository: Send + Sync {
    /// Get a profile by its unique id.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Profile>, RepositoryError>> + Send;

    /// Find a profile by its reserved username.
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<Profile>, RepositoryError>> + Send;

    /// Create a profile row (bot identity bootstrap only).
    fn create(
        &self,
        profile: &Profile,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// Read access to groups, events, and polls.
pub trait GroupRepository: Send + Sync {
    /// A group's descriptive attributes and member set, or `None` when
    /// the group does not exist.
    fn get_summary(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<GroupSummary>, RepositoryError>> + Send;

    /// A group's events, soonest first.
    fn upcoming_events(
        &self,
        group_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<EventSummary>, RepositoryError>> + Send;

    /// Polls attached to the given events, bounded by `limit`.
    fn polls_for_events(
        &self,
        event_ids: &[Uuid],
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<PollSummary>, RepositoryError>> + Send;
}
