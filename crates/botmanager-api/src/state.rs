//! Application state wiring the services together.
//!
//! AppState holds the concrete service instances used by both the CLI and the
//! REST API. `BotService` is generic over the store; AppState pins it to
//! SQLite.

use std::path::PathBuf;
use std::sync::Arc;

use botmanager_core::service::bot::BotService;
use botmanager_infra::config::database_url;
use botmanager_infra::sqlite::api_key::SqliteApiKeyStore;
use botmanager_infra::sqlite::bot::SqliteBotStore;
use botmanager_infra::sqlite::pool::DatabasePool;
use botmanager_types::config::ServiceConfig;

/// Concrete type alias for the service generics pinned to infra implementations.
pub type ConcreteBotService = BotService<SqliteBotStore>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub bot_service: Arc<ConcreteBotService>,
    pub api_keys: SqliteApiKeyStore,
    pub config: Arc<ServiceConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init(data_dir: PathBuf, config: ServiceConfig) -> anyhow::Result<Self> {
        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = database_url(&config, &data_dir);
        let db_pool = DatabasePool::with_acquire_timeout(&db_url, config.acquire_timeout()).await?;

        Ok(Self::from_pool(db_pool, config, data_dir))
    }

    /// Wire services over an already-open pool.
    pub fn from_pool(db_pool: DatabasePool, config: ServiceConfig, data_dir: PathBuf) -> Self {
        let bot_service = BotService::new(SqliteBotStore::new(db_pool.clone()))
            .with_span(tracing::info_span!("bot_service", store = "sqlite"));

        Self {
            bot_service: Arc::new(bot_service),
            api_keys: SqliteApiKeyStore::new(db_pool.clone()),
            config: Arc::new(config),
            data_dir,
            db_pool,
        }
    }
}
