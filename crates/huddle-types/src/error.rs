use thiserror::Error;

/// Errors from repository operations (used by trait definitions in huddle-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by chat operations.
///
/// Store-level failures are wrapped into the generic fetch/send variants;
/// callers see either a full result or one of these, never a partial page.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message must be between 1 and {max} characters")]
    InvalidBody { max: usize },

    #[error("invalid message kind: '{0}'")]
    InvalidKind(String),

    #[error("limit must be between 1 and {max}")]
    InvalidLimit { max: i64 },

    #[error("offset must be non-negative")]
    InvalidOffset,

    #[error("failed to send message")]
    SendFailed,

    #[error("failed to fetch messages")]
    FetchFailed,
}

impl From<RepositoryError> for ChatError {
    fn from(_: RepositoryError) -> Self {
        // Repository detail is logged at the call site; callers only see
        // the generic signal.
        ChatError::FetchFailed
    }
}
