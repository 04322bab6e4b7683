//! Group context types.
//!
//! Groups, events, and polls are owned elsewhere; the chat core reads them
//! for membership checks and for the bot pipeline's context gathering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Descriptive attributes of a group, as consulted by the bot pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub group_type: String,
    /// Member profile ids; membership gates every chat operation.
    pub members: Vec<Uuid>,
}

impl GroupSummary {
    /// Minimal placeholder used when the group fetch fails; the pipeline
    /// degrades to this rather than aborting.
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            name: "Unknown Group".to_string(),
            description: None,
            group_type: "personal".to_string(),
            members: Vec::new(),
        }
    }
}

/// An upcoming event belonging to a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub group_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date_time: Option<DateTime<Utc>>,
}

/// A poll attached to one of a group's events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSummary {
    pub id: Uuid,
    pub event_id: Uuid,
    pub question: String,
    pub option_count: usize,
}

/// Everything the bot pipeline knows about a group when generating.
#[derive(Debug, Clone)]
pub struct GroupContext {
    pub group: GroupSummary,
    pub events: Vec<EventSummary>,
    pub polls: Vec<PollSummary>,
}

impl GroupContext {
    /// Fully degraded context: unknown group, no events, no polls.
    pub fn unknown(group_id: Uuid) -> Self {
        Self {
            group: GroupSummary::unknown(group_id),
            events: Vec::new(),
            polls: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_context_is_empty_but_usable() {
        let id = Uuid::now_v7();
        let ctx = GroupContext::unknown(id);
        assert_eq!(ctx.group.id, id);
        assert_eq!(ctx.group.name, "Unknown Group");
        assert!(ctx.events.is_empty());
        assert!(ctx.polls.is_empty());
    }
}
