//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{OpenAiCompletionAdapter, PgStore, SnapGateway},
    config::Config,
    error::ApiError,
    web::{
        chat_handler, chat_history_handler, create_payment_handler, home_handler,
        payment_notification_handler, rest::ApiDoc, search_mentors_handler,
        state::AppState, upload_material_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use mentor_core::ports::PaymentGateway;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
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
    let store = Arc::new(PgStore::new(db_pool));
    info!("Running database migrations...");
    store
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let completion_api_key = config
        .completion_api_key
        .as_ref()
        .ok_or_else(|| ApiError::Internal("GROQ_API_KEY is required".to_string()))?;
    let completion_config = OpenAIConfig::new()
        .with_api_key(completion_api_key)
        .with_api_base(&config.completion_api_base);
    let completion = Arc::new(OpenAiCompletionAdapter::new(
        Client::with_config(completion_config),
        config.completion_model.clone(),
        config.completion_temperature,
        config.completion_max_tokens,
        Duration::from_secs(config.completion_timeout_secs),
    ));

    let payment: Option<Arc<dyn PaymentGateway>> = match &config.payment_server_key {
        Some(server_key) => Some(Arc::new(SnapGateway::new(
            config.payment_base_url.clone(),
            server_key.clone(),
        ))),
        None => {
            warn!("PAYMENT_SERVER_KEY not set; payment endpoints will answer 503");
            None
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        completion,
        payment,
        config: config.clone(),
    });

    // --- 5. Create the Web Router ---
    // The original service ran fully open CORS; keep that surface.
    let api_router = Router::new()
        .route("/", get(home_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/history", get(chat_history_handler))
        .route("/mentors/search", get(search_mentors_handler))
        .route("/educator/upload", post(upload_material_handler))
        .route("/payment/create", post(create_payment_handler))
        .route("/payment/notification", post(payment_notification_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(CorsLayer::permissive())
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
