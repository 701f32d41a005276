//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, GeminiModelClient, OpenAiModelClient},
    config::{Config, ModelProvider},
    error::ApiError,
    web::{
        chat_handler, compare_products_handler, evaluate_quality_handler,
        generate_description_handler, rest::ApiDoc, semantic_search_handler, state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use axum::{routing::post, Router};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trhovisko_core::ports::ModelClient;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Model Client for the Configured Provider ---
    let model: Arc<dyn ModelClient> = match config.provider {
        ModelProvider::OpenAi => {
            let api_key = config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?;
            let openai_config = OpenAIConfig::new().with_api_key(api_key);
            Arc::new(OpenAiModelClient::new(
                Client::with_config(openai_config),
                config.model.clone(),
                config.model_timeout,
            ))
        }
        ModelProvider::Gemini => {
            let api_key = config
                .gemini_api_key
                .as_ref()
                .ok_or_else(|| ApiError::Internal("GEMINI_API_KEY is required".to_string()))?;
            let client =
                GeminiModelClient::new(api_key.clone(), config.model.clone(), config.model_timeout)
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
            Arc::new(client)
        }
    };
    info!("Using model '{}' via {:?}.", config.model, config.provider);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        model,
        ledger: db_adapter.clone(),
        cache: db_adapter.clone(),
        store: db_adapter,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/ai/chat", post(chat_handler))
        .route("/ai/evaluate-quality", post(evaluate_quality_handler))
        .route("/ai/semantic-search", post(semantic_search_handler))
        .route("/ai/compare-products", post(compare_products_handler))
        .route("/ai/generate-description", post(generate_description_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
