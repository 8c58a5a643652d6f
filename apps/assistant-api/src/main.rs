//! Assistant API - conversational catalog management over HTTP

use std::sync::Arc;

use axum_helpers::server::create_app;
use axum_helpers::health_router;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_assistant::{
    AnswerService, ChatCompletion, CommandInterpreter, CommandProcessor, GroqChatClient,
    InMemoryPendingStore, PromptGateway,
};
use domain_catalog::{CatalogRepository, InMemoryCatalogRepository, PgCatalogRepository};
use migration::{Migrator, MigratorTrait};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod config;
mod routes;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let repo: Arc<dyn CatalogRepository> = match &config.database {
        Some(database) => {
            info!("Connecting to PostgreSQL");
            let db = database::connect_from_config(database).await?;
            Migrator::up(&db, None).await?;
            info!("Migrations applied");
            Arc::new(PgCatalogRepository::new(db))
        }
        None => {
            warn!("DATABASE_URL is not set; using the in-memory catalog");
            Arc::new(InMemoryCatalogRepository::new())
        }
    };

    let chat: Option<Arc<dyn ChatCompletion>> = match config.llm.clone() {
        Some(llm) => {
            info!(model = %llm.model, "LLM interpreter enabled");
            Some(Arc::new(GroqChatClient::new(llm)?))
        }
        None => {
            warn!("GROQ_API_KEY is not set; free-text interpretation is disabled");
            None
        }
    };

    let interpreter = chat
        .clone()
        .map(|chat| CommandInterpreter::new(chat, repo.clone()));
    let qa = chat.map(|chat| AnswerService::new(chat, repo.clone()));

    let processor = CommandProcessor::new(repo, interpreter);
    let gateway = Arc::new(PromptGateway::new(
        processor,
        Arc::new(InMemoryPendingStore::new()),
        qa,
    ));

    let state = AppState { gateway };
    let app = routes::routes(state)
        .layer(TraceLayer::new_for_http())
        .merge(health_router(config.app.clone()));

    info!("Starting Assistant API on port {}", config.server.port);
    create_app(app, &config.server).await?;

    info!("Assistant API shutdown complete");
    Ok(())
}
