//! Chat view: one group visit's worth of synchronized state.
//!
//! A `ChatView` owns the timeline plus the feed and echo subscriptions for
//! a single group, acquired on attach and released deterministically when
//! the view is dropped (guard objects cancel the listener tasks; the echo
//! membership is released by the task itself on exit). Sends are
//! serialized: one in-flight send at a time, so interleaved submissions
//! cannot double-trigger the bot.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use huddle_types::error::ChatError;
use huddle_types::message::{AuthorRef, ChatMessage, MessageKind};
use huddle_types::schema::SchemaVariant;

use crate::bot::{BotPipeline, BotReply};
use crate::chat::repository::{GroupRepository, MessageRepository, ProfileRepository};
use crate::chat::store::MessageStore;
use crate::llm::LlmProvider;
use crate::sync::echo::{EchoChannel, EchoEvent, EchoHub};
use crate::sync::feed::{FeedSubscription, spawn_listener};
use crate::sync::timeline::{DEFAULT_PAGE_SIZE, Timeline};

/// Result of a [`ChatView::send`].
#[derive(Debug)]
pub enum SendOutcome {
    /// An ordinary message.
    Message(ChatMessage),
    /// A bot query: the user's message plus the pipeline's reply.
    WithBotReply {
        user_message: ChatMessage,
        bot_reply: BotReply,
    },
}

/// The active chat view for one (viewer, group) pair.
pub struct ChatView<M, P, G, L>
where
    M: MessageRepository + 'static,
    P: ProfileRepository + 'static,
    G: GroupRepository + 'static,
    L: LlmProvider + 'static,
{
    group_id: Uuid,
    viewer: Uuid,
    store: Arc<MessageStore<M, P>>,
    pipeline: Arc<BotPipeline<L, G, P, M>>,
    echo: EchoChannel,
    timeline: Arc<Mutex<Timeline>>,
    /// Variant the feed subscription is currently bound to.
    variant: StdMutex<SchemaVariant>,
    /// Replaced wholesale on variant rebind; the old guard cancels the old
    /// listener, so subscriptions never accumulate.
    feed_sub: StdMutex<FeedSubscription>,
    echo_cancel: CancellationToken,
    send_gate: Mutex<()>,
    page_size: usize,
}

impl<M, P, G, L> ChatView<M, P, G, L>
where
    M: MessageRepository + 'static,
    P: ProfileRepository + 'static,
    G: GroupRepository + 'static,
    L: LlmProvider + 'static,
{
    /// Enter a group: probe the live schema variant, load the initial
    /// page, and subscribe to the feed and the echo channel.
    pub async fn attach(
        store: Arc<MessageStore<M, P>>,
        pipeline: Arc<BotPipeline<L, G, P, M>>,
        echo_hub: Arc<EchoHub>,
        group_id: Uuid,
        viewer: Uuid,
    ) -> Result<Self, ChatError> {
        let page_size = DEFAULT_PAGE_SIZE;
        let variant = store.detect_variant().await;

        let page = store
            .list(group_id, Some(page_size as i64), Some(0))
            .await?;

        let mut timeline = Timeline::new(page_size);
        timeline.apply_initial_page(page.messages);
        let timeline = Arc::new(Mutex::new(timeline));

        let feed_sub = spawn_listener(
            store.feed(),
            group_id,
            variant,
            viewer,
            Arc::clone(store.resolver()),
            Arc::clone(&timeline),
        );

        let echo = echo_hub.join(group_id);
        let echo_cancel =
            spawn_echo_listener(&echo, echo_hub, group_id, Arc::clone(&timeline));

        info!(group_id = %group_id, variant = %variant, "chat view attached");

        Ok(Self {
            group_id,
            viewer,
            store,
            pipeline,
            echo,
            timeline,
            variant: StdMutex::new(variant),
            feed_sub: StdMutex::new(feed_sub),
            echo_cancel,
            send_gate: Mutex::new(()),
            page_size,
        })
    }

    /// Send a message, routing `@bot` queries through the pipeline.
    ///
    /// Blank input is rejected before any network call. Sends are
    /// serialized: a second call waits for the first to finish.
    pub async fn send(&self, text: &str) -> Result<SendOutcome, ChatError> {
        let _in_flight = self.send_gate.lock().await;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChatError::InvalidBody {
                max: crate::chat::store::MAX_BODY_CHARS,
            });
        }

        self.sync_variant().await;

        let user_message = self
            .store
            .send(
                self.group_id,
                AuthorRef::User(self.viewer),
                trimmed,
                MessageKind::Text,
            )
            .await?;
        self.apply_local(user_message.clone()).await;

        let Some(query) = parse_bot_query(trimmed) else {
            return Ok(SendOutcome::Message(user_message));
        };

        let bot_reply = self.pipeline.respond(self.group_id, &query).await;
        if let Some(bot_message) = bot_reply.message.clone() {
            self.apply_local(bot_message).await;
        }

        Ok(SendOutcome::WithBotReply {
            user_message,
            bot_reply,
        })
    }

    /// Send an attachment message: the caller has already uploaded the
    /// bytes and obtained a public URL, which becomes the body.
    pub async fn send_attachment(&self, url: &str) -> Result<ChatMessage, ChatError> {
        let _in_flight = self.send_gate.lock().await;

        self.sync_variant().await;

        let message = self
            .store
            .send(
                self.group_id,
                AuthorRef::User(self.viewer),
                url,
                MessageKind::Attachment,
            )
            .await?;
        self.apply_local(message.clone()).await;
        Ok(message)
    }

    /// Fetch the next older page and prepend it. Returns how many rows
    /// were fetched; 0 when history is exhausted.
    pub async fn load_older(&self) -> Result<usize, ChatError> {
        self.sync_variant().await;

        let (offset, has_more) = {
            let tl = self.timeline.lock().await;
            (tl.cursor(), tl.has_more())
        };
        if !has_more {
            return Ok(0);
        }

        let page = self
            .store
            .list(
                self.group_id,
                Some(self.page_size as i64),
                Some(offset as i64),
            )
            .await?;

        let mut tl = self.timeline.lock().await;
        let fetched = page.messages.len();
        tl.apply_older_page(page.messages);
        Ok(fetched)
    }

    /// Snapshot of the current ordered list.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.timeline.lock().await.messages().to_vec()
    }

    /// Whether an older page may still exist.
    pub async fn has_more(&self) -> bool {
        self.timeline.lock().await.has_more()
    }

    pub fn group_id(&self) -> Uuid {
        self.group_id
    }

    /// Append a locally produced row and echo it to the group's other
    /// open views.
    async fn apply_local(&self, message: ChatMessage) {
        self.timeline.lock().await.apply_optimistic(message.clone());
        self.echo.broadcast(message);
    }

    /// Re-probe the live variant; on change, replace the feed
    /// subscription so pushes keep arriving from the right table.
    async fn sync_variant(&self) {
        let live = self.store.detect_variant().await;

        let changed = {
            let mut current = self.variant.lock().expect("variant lock");
            if *current == live {
                false
            } else {
                info!(group_id = %self.group_id, from = %current, to = %live, "schema variant changed, rebinding feed");
                *current = live;
                true
            }
        };

        if changed {
            let replacement = spawn_listener(
                self.store.feed(),
                self.group_id,
                live,
                self.viewer,
                Arc::clone(self.store.resolver()),
                Arc::clone(&self.timeline),
            );
            *self.feed_sub.lock().expect("feed_sub lock") = replacement;
        }
    }
}

impl<M, P, G, L> Drop for ChatView<M, P, G, L>
where
    M: MessageRepository + 'static,
    P: ProfileRepository + 'static,
    G: GroupRepository + 'static,
    L: LlmProvider + 'static,
{
    fn drop(&mut self) {
        // The feed guard cancels its task on drop; the echo task also
        // releases the hub membership when it exits.
        self.echo_cancel.cancel();
    }
}

/// Extract the query from an `@bot` command: `@bot <q>`, `@bot,<q>`, or a
/// bare `@bot`. Case-insensitive. `None` for ordinary messages.
pub fn parse_bot_query(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if !lower.starts_with("@bot") {
        return None;
    }

    let mut query = text[4..].trim();
    if let Some(stripped) = query.strip_prefix(',') {
        query = stripped.trim();
    }
    Some(query.to_string())
}

/// Forward echo deliveries for `group_id` into the timeline, dedup by id.
/// On exit the task drops its receiver and releases the hub membership.
fn spawn_echo_listener(
    channel: &EchoChannel,
    hub: Arc<EchoHub>,
    group_id: Uuid,
    timeline: Arc<Mutex<Timeline>>,
) -> CancellationToken {
    let mut rx = channel.subscribe();
    let token = CancellationToken::new();
    let task_token = token.clone();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = task_token.cancelled() => break,
                recv = rx.recv() => match recv {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            let EchoEvent::Message { message } = event;
            if message.group_id != group_id {
                continue;
            }
            timeline.lock().await.apply_incoming(message);
        }

        drop(rx);
        hub.release(&group_id);
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use huddle_types::error::RepositoryError;
    use huddle_types::group::{EventSummary, GroupSummary, PollSummary};
    use huddle_types::llm::{CompletionRequest, CompletionResponse, LlmError};
    use huddle_types::profile::Profile;
    use huddle_types::schema::{InsertPayload, MessageRow};
    use std::sync::Mutex as SyncMutex;

    use crate::bot::BotConfig;
    use crate::identity::IdentityResolver;
    use crate::sync::feed::FeedHub;

    // --- In-memory fixtures ---------------------------------------------

    /// Message repository over a shared Vec, always on the
    /// `chat_messages` variant unless told otherwise.
    struct MemMessages {
        rows: Arc<SyncMutex<Vec<MessageRow>>>,
        variant: SyncMutex<SchemaVariant>,
    }

    impl MemMessages {
        fn shared() -> Arc<Self> {
            Arc::new(Self {
                rows: Arc::new(SyncMutex::new(Vec::new())),
                variant: SyncMutex::new(SchemaVariant::ChatMessages),
            })
        }

        fn set_variant(&self, variant: SchemaVariant) {
            *self.variant.lock().unwrap() = variant;
        }
    }

    impl MessageRepository for Arc<MemMessages> {
        async fn detect_variant(&self) -> SchemaVariant {
            *self.variant.lock().unwrap()
        }

        async fn insert(
            &self,
            variant: SchemaVariant,
            payload: &InsertPayload,
        ) -> Result<MessageRow, RepositoryError> {
            let row = MessageRow {
                id: payload.id,
                group_id: payload.group_id,
                user_id: payload.user_id.clone(),
                message: matches!(variant, SchemaVariant::ChatMessages)
                    .then(|| payload.body.clone()),
                content: matches!(variant, SchemaVariant::Messages)
                    .then(|| payload.body.clone()),
                message_type: payload.message_type.clone(),
                attachment_url: payload.attachment_url.clone(),
                created_at: payload.created_at,
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }

        async fn page_newest_first(
            &self,
            _variant: SchemaVariant,
            group_id: &Uuid,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<MessageRow>, RepositoryError> {
            let rows = self.rows.lock().unwrap();
            let mut newest_first: Vec<MessageRow> = rows
                .iter()
                .filter(|r| r.group_id == *group_id)
                .cloned()
                .collect();
            newest_first.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(newest_first
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        }

        async fn since(
            &self,
            _variant: SchemaVariant,
            group_id: &Uuid,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<MessageRow>, RepositoryError> {
            let rows = self.rows.lock().unwrap();
            let mut matching: Vec<MessageRow> = rows
                .iter()
                .filter(|r| r.group_id == *group_id && r.created_at >= cutoff)
                .cloned()
                .collect();
            matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(matching)
        }
    }

    struct NoProfiles;

    impl ProfileRepository for NoProfiles {
        async fn get(&self, _id: &Uuid) -> Result<Option<Profile>, RepositoryError> {
            Ok(None)
        }
        async fn find_by_username(&self, _u: &str) -> Result<Option<Profile>, RepositoryError> {
            Ok(None)
        }
        async fn create(&self, _p: &Profile) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    struct NoGroups;

    impl GroupRepository for NoGroups {
        async fn get_summary(&self, _id: &Uuid) -> Result<Option<GroupSummary>, RepositoryError> {
            Ok(None)
        }
        async fn upcoming_events(
            &self,
            _group_id: &Uuid,
        ) -> Result<Vec<EventSummary>, RepositoryError> {
            Ok(Vec::new())
        }
        async fn polls_for_events(
            &self,
            _event_ids: &[Uuid],
            _limit: i64,
        ) -> Result<Vec<PollSummary>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    struct EchoLlm;

    impl LlmProvider for EchoLlm {
        fn name(&self) -> &str {
            "echo"
        }
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                text: format!("re: {}", request.user_message),
                model: None,
            })
        }
    }

    type TestView = ChatView<Arc<MemMessages>, NoProfiles, NoGroups, EchoLlm>;

    struct Fixture {
        store: Arc<MessageStore<Arc<MemMessages>, NoProfiles>>,
        pipeline: Arc<BotPipeline<EchoLlm, NoGroups, NoProfiles, Arc<MemMessages>>>,
        echo_hub: Arc<EchoHub>,
        messages: Arc<MemMessages>,
    }

    fn fixture() -> Fixture {
        let messages = MemMessages::shared();
        let feed = FeedHub::default();
        let resolver = Arc::new(IdentityResolver::new(NoProfiles));
        let store = Arc::new(MessageStore::new(
            Arc::clone(&messages),
            resolver,
            feed.clone(),
        ));
        let pipeline = Arc::new(BotPipeline::new(
            EchoLlm,
            NoGroups,
            NoProfiles,
            Arc::clone(&messages),
            feed,
            BotConfig {
                bot_author_id: Some(Uuid::now_v7()),
                ..BotConfig::default()
            },
        ));
        Fixture {
            store,
            pipeline,
            echo_hub: Arc::new(EchoHub::new()),
            messages,
        }
    }

    async fn view(f: &Fixture, group_id: Uuid, viewer: Uuid) -> TestView {
        ChatView::attach(
            Arc::clone(&f.store),
            Arc::clone(&f.pipeline),
            Arc::clone(&f.echo_hub),
            group_id,
            viewer,
        )
        .await
        .unwrap()
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }

    // --- Tests -----------------------------------------------------------

    #[test]
    fn bot_query_parsing() {
        assert_eq!(
            parse_bot_query("@bot suggest a restaurant").as_deref(),
            Some("suggest a restaurant")
        );
        assert_eq!(parse_bot_query("@bot, where to?").as_deref(), Some("where to?"));
        assert_eq!(parse_bot_query("@BOT hi").as_deref(), Some("hi"));
        assert_eq!(parse_bot_query("@bot").as_deref(), Some(""));
        assert!(parse_bot_query("hello @bot").is_none());
        assert!(parse_bot_query("plain message").is_none());
    }

    #[tokio::test]
    async fn blank_sends_are_rejected_before_any_io() {
        let f = fixture();
        let v = view(&f, Uuid::now_v7(), Uuid::now_v7()).await;

        assert!(v.send("   \n ").await.is_err());
        assert!(f.messages.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn plain_send_appears_exactly_once_in_own_view() {
        let f = fixture();
        let group_id = Uuid::now_v7();
        let v = view(&f, group_id, Uuid::now_v7()).await;

        let outcome = v.send("Hello team").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Message(_)));

        // The feed and the self-echo both redeliver the row; dedup keeps one.
        settle().await;
        let messages = v.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "Hello team");
    }

    #[tokio::test]
    async fn second_tab_receives_exactly_once() {
        let f = fixture();
        let group_id = Uuid::now_v7();
        let sender = Uuid::now_v7();

        // Same user in tab 2 (feed skips, echo delivers) and a different
        // user in tab 3 (feed and echo both deliver, dedup keeps one).
        let tab1 = view(&f, group_id, sender).await;
        let tab2 = view(&f, group_id, sender).await;
        let tab3 = view(&f, group_id, Uuid::now_v7()).await;

        tab1.send("ping").await.unwrap();
        settle().await;

        assert_eq!(tab2.messages().await.len(), 1);
        assert_eq!(tab3.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn other_groups_see_nothing() {
        let f = fixture();
        let sender = Uuid::now_v7();
        let tab_a = view(&f, Uuid::now_v7(), sender).await;
        let tab_b = view(&f, Uuid::now_v7(), Uuid::now_v7()).await;

        tab_a.send("only for group A").await.unwrap();
        settle().await;

        assert!(tab_b.messages().await.is_empty());
    }

    #[tokio::test]
    async fn bot_command_produces_user_and_bot_messages() {
        let f = fixture();
        let group_id = Uuid::now_v7();
        let v = view(&f, group_id, Uuid::now_v7()).await;

        let outcome = v.send("@bot suggest a restaurant").await.unwrap();
        let SendOutcome::WithBotReply {
            user_message,
            bot_reply,
        } = outcome
        else {
            panic!("expected a bot reply");
        };

        assert_eq!(user_message.body, "@bot suggest a restaurant");
        assert!(bot_reply.success);
        assert_eq!(bot_reply.response, "re: suggest a restaurant");
        // The persisted reply always carries the fixed bot identity.
        assert_eq!(
            bot_reply
                .message
                .unwrap()
                .author_profile
                .unwrap()
                .display_name
                .as_deref(),
            Some("Huddle Bot")
        );

        settle().await;
        let messages = v.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].body, "re: suggest a restaurant");
    }

    #[tokio::test]
    async fn attachment_send_carries_the_url() {
        let f = fixture();
        let v = view(&f, Uuid::now_v7(), Uuid::now_v7()).await;

        let message = v
            .send_attachment("https://cdn.example/photo.jpg")
            .await
            .unwrap();
        assert_eq!(message.kind, MessageKind::Attachment);
        assert_eq!(
            message.attachment_url.as_deref(),
            Some("https://cdn.example/photo.jpg")
        );
    }

    #[tokio::test]
    async fn load_older_pages_backward_without_duplicates() {
        let f = fixture();
        let group_id = Uuid::now_v7();

        // 120 pre-existing rows, oldest first.
        {
            let mut rows = f.messages.rows.lock().unwrap();
            let base = Utc::now() - chrono::Duration::hours(3);
            for i in 0..120 {
                rows.push(MessageRow {
                    id: Uuid::now_v7(),
                    group_id,
                    user_id: None,
                    message: Some(format!("m{i}")),
                    content: None,
                    message_type: Some("text".to_string()),
                    attachment_url: None,
                    created_at: base + chrono::Duration::minutes(i),
                });
            }
        }

        let v = view(&f, group_id, Uuid::now_v7()).await;
        assert_eq!(v.messages().await.len(), 50);
        assert!(v.has_more().await);
        // The initial page is the 50 most recent, chronological.
        assert_eq!(v.messages().await[0].body, "m70");
        assert_eq!(v.messages().await[49].body, "m119");

        assert_eq!(v.load_older().await.unwrap(), 50);
        assert_eq!(v.load_older().await.unwrap(), 20);
        assert!(!v.has_more().await);
        assert_eq!(v.load_older().await.unwrap(), 0);

        let messages = v.messages().await;
        assert_eq!(messages.len(), 120);
        // Chronological from the very first row, no gaps or duplicates.
        for (i, m) in messages.iter().enumerate() {
            assert_eq!(m.body, format!("m{i}"));
        }
    }

    #[tokio::test]
    async fn variant_change_rebinds_the_feed_subscription() {
        let f = fixture();
        let group_id = Uuid::now_v7();
        let viewer = Uuid::now_v7();
        let observer = view(&f, group_id, viewer).await;

        // The deployment migrates to the legacy shape between operations.
        f.messages.set_variant(SchemaVariant::Messages);
        observer.load_older().await.unwrap();

        // A row inserted under the new variant now reaches the view.
        let row = MessageRow {
            id: Uuid::now_v7(),
            group_id,
            user_id: Some(Uuid::now_v7().to_string()),
            message: None,
            content: Some("post-migration".to_string()),
            message_type: None,
            attachment_url: None,
            created_at: Utc::now(),
        };
        f.store.feed().publish(crate::sync::feed::FeedEvent {
            variant: SchemaVariant::Messages,
            row,
        });
        settle().await;

        let messages = observer.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "post-migration");
    }

    #[tokio::test]
    async fn dropping_a_view_releases_its_subscriptions() {
        let f = fixture();
        let group_id = Uuid::now_v7();
        let v = view(&f, group_id, Uuid::now_v7()).await;

        assert_eq!(f.echo_hub.channel_count(), 1);
        drop(v);
        settle().await;
        assert_eq!(f.echo_hub.channel_count(), 0);
    }
}
