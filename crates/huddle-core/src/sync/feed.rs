//! Change feed: row-insert notifications and the per-view listener.
//!
//! The store publishes every inserted chat row on a [`FeedHub`] built on
//! `tokio::sync::broadcast`. Listeners subscribe per (group, schema
//! variant), normalize the raw row, resolve the author's profile, and hand
//! the result to the reconciliation engine. There is no delivery guarantee
//! for offline subscribers -- catch-up is the REST page fetch's job.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;
use uuid::Uuid;

use huddle_types::message::{AuthorRef, MessageKind};
use huddle_types::schema::{MessageRow, SchemaVariant};

use crate::chat::repository::ProfileRepository;
use crate::identity::IdentityResolver;
use crate::sync::timeline::Timeline;

/// A row-insert notification, carrying the raw variant-shaped row.
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub variant: SchemaVariant,
    pub row: MessageRow,
}

/// Multi-consumer hub for row-insert notifications.
///
/// Wraps a `tokio::sync::broadcast` channel. Cloning the hub clones the
/// sender, allowing multiple producers and consumers. Publishing with no
/// active subscribers is a no-op.
pub struct FeedHub {
    sender: broadcast::Sender<FeedEvent>,
}

impl FeedHub {
    /// Create a new hub with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }

    /// Publish a row-insert notification to all current subscribers.
    pub fn publish(&self, event: FeedEvent) {
        let _ = self.sender.send(event);
    }
}

impl Clone for FeedHub {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for FeedHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHub")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

/// Guard for a running feed listener task.
///
/// Dropping the guard cancels the task, so a subscription can never
/// outlive the view that acquired it, and rebinding to a new schema
/// variant (drop old, spawn new) cannot accumulate duplicates.
#[derive(Debug)]
pub struct FeedSubscription {
    _cancel: DropGuard,
}

/// Spawn a listener forwarding matching feed rows into a timeline.
///
/// The listener:
/// - drops rows for other groups or the other schema variant;
/// - skips rows authored by `viewer` (the optimistic insert and the echo
///   channel already cover that path);
/// - attaches the fixed bot profile to bot/system rows, and resolves
///   everyone else through the identity resolver;
/// - merges into the timeline idempotently.
pub fn spawn_listener<P>(
    hub: &FeedHub,
    group_id: Uuid,
    variant: SchemaVariant,
    viewer: Uuid,
    resolver: Arc<IdentityResolver<P>>,
    timeline: Arc<Mutex<Timeline>>,
) -> FeedSubscription
where
    P: ProfileRepository + 'static,
{
    let mut rx = hub.subscribe();
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                recv = rx.recv() => match recv {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(group_id = %group_id, skipped, "feed listener lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            if event.variant != variant || event.row.group_id != group_id {
                continue;
            }

            let mut message = event.row.normalize(variant);
            if message.author.is_user(&viewer) {
                continue;
            }

            message.author_profile = match (message.author, message.kind) {
                (AuthorRef::Bot, _) | (_, MessageKind::System) => {
                    Some(huddle_types::profile::Profile::bot())
                }
                (author, _) => resolver.resolve(author).await,
            };

            timeline.lock().await.apply_incoming(message);
        }
    });

    FeedSubscription { _cancel: guard }
}
