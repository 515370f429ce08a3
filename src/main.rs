use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use prompt_query_backend::api::routes::{create_router_with_state, AppState};
use prompt_query_backend::config::Config;
use prompt_query_backend::services::connection_pool::{create_pool, mask_credentials};
use prompt_query_backend::services::database::{PostgreSQLExecutor, QueryExecutor};
use prompt_query_backend::services::{
    HistoryRecorder, LlmService, PromptCache, QueryService, SqlGenerationClient,
};
use prompt_query_backend::storage::SqliteStorage;

/// Pending history records kept before new ones are dropped
const HISTORY_QUEUE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_ansi(config.logging.style != "never")
        .init();

    info!("Starting server on {}", config.server_address());

    // Initialize SQLite history storage
    let storage = Arc::new(
        SqliteStorage::new(&config.storage.history_path)
            .await
            .map_err(|e| {
                error!("Failed to initialize history database: {}", e);
                e
            })
            .context("opening history database")?,
    );

    // Query database pool; connections are opened on first use
    let pool = create_pool(&config.database.url, config.database.max_pool_size)
        .with_context(|| format!("creating pool for {}", mask_credentials(&config.database.url)))?;
    let executor: Arc<dyn QueryExecutor> = Arc::new(PostgreSQLExecutor::new(pool));

    let llm: Arc<dyn SqlGenerationClient> = Arc::new(LlmService::new(&config)?);
    info!("AI service endpoint: {}", config.llm.gateway_url);

    let cache = Arc::new(PromptCache::new(config.cache_ttl()));
    let history = HistoryRecorder::spawn(storage.clone(), HISTORY_QUEUE_CAPACITY);

    let query_service = QueryService::new(llm.clone(), executor.clone(), cache.clone(), history)
        .with_config(&config);

    let state = AppState {
        query_service: Arc::new(query_service),
        cache,
        storage,
        llm,
        executor,
        config: config.clone(),
    };

    // Create router with state
    let app: Router = create_router_with_state(state);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
