//! The bot response pipeline.
//!
//! One invocation walks RECEIVED -> CONTEXT_GATHERED -> GENERATED ->
//! PERSISTED -> RETURNED. Every transition has a fallback: a failed
//! context slice degrades to empty, a failed generation substitutes a
//! deterministic explanatory message, a failed persist yields a reply
//! without a stored row. The public entry point returns [`BotReply`],
//! never an error -- chat UX must not hard-fail on an AI feature.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use huddle_types::group::GroupContext;
use huddle_types::llm::{CompletionRequest, LlmError};
use huddle_types::message::{AuthorRef, ChatMessage, MessageKind};
use huddle_types::profile::{BOT_USERNAME, Profile};
use huddle_types::schema::to_insert_payload;

use crate::chat::repository::{GroupRepository, MessageRepository, ProfileRepository};
use crate::llm::LlmProvider;
use crate::sync::feed::{FeedEvent, FeedHub};

use super::prompt::build_system_prompt;

/// How many polls the context gatherer fetches at most.
const POLL_CONTEXT_LIMIT: i64 = 10;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Configured bot author id; when unset the pipeline falls back to the
    /// reserved-username profile, creating it if necessary.
    pub bot_author_id: Option<Uuid>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-lite".to_string(),
            max_tokens: 1024,
            temperature: None,
            bot_author_id: None,
        }
    }
}

/// The pipeline's result. `success` is always true by design; a degraded
/// generation or a failed persist changes the contents, not the shape.
#[derive(Debug, Clone, Serialize)]
pub struct BotReply {
    pub success: bool,
    pub response: String,
    pub message: Option<ChatMessage>,
    pub timestamp: DateTime<Utc>,
}

/// Produces and persists assistant answers for one group query at a time.
pub struct BotPipeline<L, G, P, M>
where
    L: LlmProvider,
    G: GroupRepository,
    P: ProfileRepository,
    M: MessageRepository,
{
    llm: L,
    groups: G,
    profiles: P,
    messages: M,
    feed: FeedHub,
    config: BotConfig,
}

impl<L, G, P, M> BotPipeline<L, G, P, M>
where
    L: LlmProvider,
    G: GroupRepository,
    P: ProfileRepository,
    M: MessageRepository,
{
    pub fn new(llm: L, groups: G, profiles: P, messages: M, feed: FeedHub, config: BotConfig) -> Self {
        Self {
            llm,
            groups,
            profiles,
            messages,
            feed,
            config,
        }
    }

    /// Answer a user query against a group's context and persist the
    /// answer as a chat row. Never returns an error.
    pub async fn respond(&self, group_id: Uuid, query: &str) -> BotReply {
        let context = self.gather_context(group_id).await;
        let response = self.generate(&context, query).await;
        let message = self.persist(group_id, &response).await;

        BotReply {
            success: true,
            response,
            message,
            timestamp: Utc::now(),
        }
    }

    /// Run only the context and generation states, returning the response
    /// text. The send route uses this and persists the answer itself as a
    /// system notice.
    pub async fn generate_response(&self, group_id: Uuid, query: &str) -> String {
        let context = self.gather_context(group_id).await;
        self.generate(&context, query).await
    }

    /// Fetch the group's attributes, events, and a bounded set of polls.
    /// Any sub-fetch failure degrades that slice to empty/default.
    async fn gather_context(&self, group_id: Uuid) -> GroupContext {
        let group = match self.groups.get_summary(&group_id).await {
            Ok(Some(group)) => group,
            Ok(None) => {
                warn!(group_id = %group_id, "group not found, using placeholder context");
                return GroupContext::unknown(group_id);
            }
            Err(err) => {
                warn!(group_id = %group_id, error = %err, "group fetch failed, using placeholder context");
                return GroupContext::unknown(group_id);
            }
        };

        let events = match self.groups.upcoming_events(&group_id).await {
            Ok(events) => events,
            Err(err) => {
                warn!(group_id = %group_id, error = %err, "events fetch failed");
                Vec::new()
            }
        };

        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let polls = match self.groups.polls_for_events(&event_ids, POLL_CONTEXT_LIMIT).await {
            Ok(polls) => polls,
            Err(err) => {
                warn!(group_id = %group_id, error = %err, "polls fetch failed");
                Vec::new()
            }
        };

        GroupContext {
            group,
            events,
            polls,
        }
    }

    /// Call the generation backend; substitute a deterministic explanatory
    /// message on any failure. The substituted text is a valid response
    /// for the remaining states.
    async fn generate(&self, context: &GroupContext, query: &str) -> String {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            system: build_system_prompt(context),
            user_message: query.to_string(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        match self.llm.complete(&request).await {
            Ok(completion) => {
                info!(
                    gen_ai.operation.name = "chat",
                    gen_ai.provider.name = self.llm.name(),
                    gen_ai.request.model = %request.model,
                    response_chars = completion.text.len(),
                    "generation succeeded"
                );
                completion.text
            }
            Err(err) => {
                warn!(
                    gen_ai.provider.name = self.llm.name(),
                    gen_ai.request.model = %request.model,
                    error = %err,
                    "generation failed, substituting fallback response"
                );
                fallback_response(&err).to_string()
            }
        }
    }

    /// Persist the response as a chat row, resolving the bot's author id
    /// and the live schema variant first. Failure is logged and yields
    /// `None`; it never fails the overall call.
    async fn persist(&self, group_id: Uuid, response: &str) -> Option<ChatMessage> {
        // Unlike user sends, generated responses are not length-capped;
        // only an empty generation has nothing to persist.
        if response.trim().is_empty() {
            warn!(group_id = %group_id, "generated response has no persistable body");
            return None;
        }

        let author = match self.resolve_bot_author().await {
            Some(id) => AuthorRef::User(id),
            None => AuthorRef::None,
        };

        let variant = self.messages.detect_variant().await;
        let payload = to_insert_payload(
            variant,
            Uuid::now_v7(),
            group_id,
            author,
            response,
            MessageKind::Text,
            Utc::now(),
        );

        match self.messages.insert(variant, &payload).await {
            Ok(row) => {
                self.feed.publish(FeedEvent {
                    variant,
                    row: row.clone(),
                });
                let mut message = row.normalize(variant);
                // The bot always renders with its fixed identity.
                message.author_profile = Some(Profile::bot());
                Some(message)
            }
            Err(err) => {
                warn!(group_id = %group_id, variant = %variant, error = %err, "failed to save bot message");
                None
            }
        }
    }

    /// Resolve a stable author id for the bot: configured constant, then
    /// the existing reserved-username profile, then create one.
    ///
    /// Concurrent first-time creation is guarded by the unique username
    /// index; the loser of that race re-reads the winner's row.
    async fn resolve_bot_author(&self) -> Option<Uuid> {
        if let Some(id) = self.config.bot_author_id {
            return Some(id);
        }

        match self.profiles.find_by_username(BOT_USERNAME).await {
            Ok(Some(profile)) => return profile.id,
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "bot profile lookup failed");
                return None;
            }
        }

        let id = Uuid::now_v7();
        let profile = Profile {
            id: Some(id),
            username: Some(BOT_USERNAME.to_string()),
            display_name: Some(huddle_types::profile::BOT_DISPLAY_NAME.to_string()),
            avatar_url: None,
            email: Some(format!("{BOT_USERNAME}@system.local")),
        };

        match self.profiles.create(&profile).await {
            Ok(()) => {
                info!(bot_author_id = %id, "created bot profile");
                Some(id)
            }
            Err(err) => {
                warn!(error = %err, "failed to create bot profile");
                match self.profiles.find_by_username(BOT_USERNAME).await {
                    Ok(Some(winner)) => winner.id,
                    _ => None,
                }
            }
        }
    }
}

/// Deterministic, human-readable substitute for a failed generation.
fn fallback_response(err: &LlmError) -> &'static str {
    match err {
        LlmError::MissingApiKey => {
            "Sorry, the chatbot is not configured yet. Please ask your administrator \
             to set the GEMINI_API_KEY environment variable."
        }
        LlmError::AuthenticationFailed => {
            "There is an issue with the API key configuration. Please verify your \
             GEMINI_API_KEY is correct."
        }
        LlmError::RateLimited { .. } => {
            "The API quota has been exceeded. Please try again later or upgrade \
             your API plan."
        }
        _ => "I'm having trouble responding right now. Please try again in a moment!",
    }
}
