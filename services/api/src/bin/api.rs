//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{MemorySessionStore, OpenAiSqlAdapter, PgQueryAdapter},
    config::Config,
    error::ApiError,
    web::{self, auth::AccessGate, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use sql_assistant_core::{generation::QueryGenerator, ports::TextGenerationService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    let gate = Arc::new(AccessGate::from_secret(&config.app_secret)?);

    // --- 2. Connect to Database ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let executor = Arc::new(PgQueryAdapter::new(db_pool));

    // --- 3. Initialize the Query Generator ---
    let generator = if config.ai_assist_enabled {
        let text_service: Option<Arc<dyn TextGenerationService>> = match &config.openai_api_key {
            Some(api_key) => {
                let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
                if let Some(base_url) = &config.openai_base_url {
                    openai_config = openai_config.with_api_base(base_url);
                }
                info!("AI-assisted generation enabled with model {}", config.sql_model);
                Some(Arc::new(OpenAiSqlAdapter::new(
                    Client::with_config(openai_config),
                    config.sql_model.clone(),
                    config.sql_temperature,
                    config.sql_max_tokens,
                )))
            }
            None => {
                warn!("OPENAI_API_KEY is not set; questions will receive the fallback query");
                None
            }
        };
        Some(QueryGenerator::new(text_service))
    } else {
        info!("AI-assisted generation disabled; SQL must be entered directly");
        None
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        gate,
        sessions: Arc::new(MemorySessionStore::new()),
        generator,
        executor,
    });

    // --- 5. Create the Web Router ---
    let app = web::router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
