//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the REST API.
//! Services are generic over repository/provider traits, but AppState
//! pins them to the concrete infra implementations.

use std::sync::Arc;

use huddle_core::bot::BotPipeline;
use huddle_core::chat::store::MessageStore;
use huddle_core::identity::IdentityResolver;
use huddle_core::sync::feed::FeedHub;
use huddle_infra::config;
use huddle_infra::llm::gemini::GeminiProvider;
use huddle_infra::sqlite::group::SqliteGroupRepository;
use huddle_infra::sqlite::message::SqliteMessageRepository;
use huddle_infra::sqlite::pool::DatabasePool;
use huddle_infra::sqlite::profile::SqliteProfileRepository;

/// Concrete type aliases for the service generics pinned to infra
/// implementations.
pub type ConcreteMessageStore = MessageStore<SqliteMessageRepository, SqliteProfileRepository>;

pub type ConcreteBotPipeline = BotPipeline<
    GeminiProvider,
    SqliteGroupRepository,
    SqliteProfileRepository,
    SqliteMessageRepository,
>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConcreteMessageStore>,
    pub pipeline: Arc<ConcreteBotPipeline>,
    pub groups: Arc<SqliteGroupRepository>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to the database, load
    /// configuration, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = config::resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        // Initialize database
        let db_pool = DatabasePool::new(&config::database_url(&data_dir)).await?;

        let settings = config::load_config(&data_dir).await;

        // One feed hub shared by the store and the pipeline: every insert
        // notifies the same subscribers regardless of who wrote it.
        let feed = FeedHub::default();

        let resolver = Arc::new(IdentityResolver::new(SqliteProfileRepository::new(
            db_pool.clone(),
        )));

        let store = MessageStore::new(
            SqliteMessageRepository::new(db_pool.clone()),
            Arc::clone(&resolver),
            feed.clone(),
        );

        let llm = GeminiProvider::new(config::api_key_from_env())
            .map_err(|e| anyhow::anyhow!("failed to build LLM provider: {e}"))?;
        if !llm.is_configured() {
            tracing::warn!(
                "GEMINI_API_KEY is not set; chatbot responses will degrade to a static message"
            );
        }

        let pipeline = BotPipeline::new(
            llm,
            SqliteGroupRepository::new(db_pool.clone()),
            SqliteProfileRepository::new(db_pool.clone()),
            SqliteMessageRepository::new(db_pool.clone()),
            feed,
            settings.bot_config(),
        );

        Ok(Self {
            store: Arc::new(store),
            pipeline: Arc::new(pipeline),
            groups: Arc::new(SqliteGroupRepository::new(db_pool.clone())),
            db_pool,
        })
    }
}
