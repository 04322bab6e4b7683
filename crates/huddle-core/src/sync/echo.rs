//! Broadcast echo: per-group fan-out with self-delivery.
//!
//! A same-origin, low-latency channel so every open view of a group --
//! including the sender's own other tabs -- sees a just-sent message
//! immediately, independent of the change feed's latency. Carries the
//! fully-formed logical message; consumers dedup by id before appending.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use huddle_types::message::ChatMessage;

/// Wire shape of an echo delivery: `{event: "message", payload: {message}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum EchoEvent {
    Message { message: ChatMessage },
}

/// Registry of per-group echo channels, lazily created on first join and
/// removed when the last member leaves.
#[derive(Debug, Default)]
pub struct EchoHub {
    channels: DashMap<Uuid, broadcast::Sender<EchoEvent>>,
}

impl EchoHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a group's channel, with self-delivery enabled: the returned
    /// handle's own subscription receives messages it broadcasts itself.
    pub fn join(&self, group_id: Uuid) -> EchoChannel {
        let sender = self
            .channels
            .entry(group_id)
            .or_insert_with(|| broadcast::channel(256).0)
            .clone();

        EchoChannel { group_id, sender }
    }

    /// Drop a group's channel once nobody is subscribed.
    ///
    /// Called by views on teardown; a no-op while other tabs still hold
    /// subscriptions.
    pub fn release(&self, group_id: &Uuid) {
        self.channels
            .remove_if(group_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Number of live group channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// A handle on one group's echo channel.
#[derive(Debug, Clone)]
pub struct EchoChannel {
    group_id: Uuid,
    sender: broadcast::Sender<EchoEvent>,
}

impl EchoChannel {
    /// The group this channel fans out for.
    pub fn group_id(&self) -> Uuid {
        self.group_id
    }

    /// Subscribe to deliveries on this channel (including our own sends).
    pub fn subscribe(&self) -> broadcast::Receiver<EchoEvent> {
        self.sender.subscribe()
    }

    /// Broadcast a fully-formed message to all channel members.
    pub fn broadcast(&self, message: ChatMessage) {
        let _ = self.sender.send(EchoEvent::Message { message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use huddle_types::message::{AuthorRef, MessageKind};

    fn msg(group_id: Uuid) -> ChatMessage {
        ChatMessage {
            id: Uuid::now_v7(),
            group_id,
            author: AuthorRef::User(Uuid::now_v7()),
            body: "ping".to_string(),
            kind: MessageKind::Text,
            created_at: Utc::now(),
            attachment_url: None,
            author_profile: None,
        }
    }

    #[tokio::test]
    async fn sender_receives_its_own_broadcast() {
        let hub = EchoHub::new();
        let group_id = Uuid::now_v7();
        let channel = hub.join(group_id);
        let mut rx = channel.subscribe();

        let sent = msg(group_id);
        channel.broadcast(sent.clone());

        let EchoEvent::Message { message } = rx.recv().await.unwrap();
        assert_eq!(message.id, sent.id);
    }

    #[tokio::test]
    async fn all_tabs_on_a_group_share_one_channel() {
        let hub = EchoHub::new();
        let group_id = Uuid::now_v7();
        let tab1 = hub.join(group_id);
        let tab2 = hub.join(group_id);
        let mut rx2 = tab2.subscribe();

        let sent = msg(group_id);
        tab1.broadcast(sent.clone());

        let EchoEvent::Message { message } = rx2.recv().await.unwrap();
        assert_eq!(message.id, sent.id);
        assert_eq!(hub.channel_count(), 1);
    }

    #[tokio::test]
    async fn groups_are_isolated() {
        let hub = EchoHub::new();
        let a = hub.join(Uuid::now_v7());
        let b = hub.join(Uuid::now_v7());
        let mut rx_b = b.subscribe();

        a.broadcast(msg(a.group_id()));

        assert!(matches!(
            rx_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn release_removes_only_unused_channels() {
        let hub = EchoHub::new();
        let group_id = Uuid::now_v7();
        let channel = hub.join(group_id);

        let rx = channel.subscribe();
        hub.release(&group_id);
        assert_eq!(hub.channel_count(), 1, "subscribed channel must survive");

        drop(rx);
        hub.release(&group_id);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn echo_event_wire_shape() {
        let event = EchoEvent::Message {
            message: msg(Uuid::now_v7()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message");
        assert!(json["payload"]["message"].is_object());
    }
}
