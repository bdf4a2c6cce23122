//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{GenerationSettings, JsonFileHistorySource, OpenAiModelLoader},
    config::Config,
    error::ApiError,
    web::{
        day_handler, plan_output_handler, plan_status_handler, request_plan_handler,
        rest::ApiDoc, schedule_handler, state::AppState, week_handler, ws_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use training_plan_core::{PlanGenerator, PlannerConfig, SessionConfig};
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

    // --- 2. Initialize Service Adapters ---
    let mut openai_config = OpenAIConfig::new();
    if let Some(key) = &config.openai_api_key {
        openai_config = openai_config.with_api_key(key);
    }
    if let Some(base) = &config.openai_api_base {
        openai_config = openai_config.with_api_base(base);
    }
    let openai_client = Client::with_config(openai_config);

    let model_loader = Arc::new(OpenAiModelLoader::new(
        openai_client,
        GenerationSettings {
            model: config.plan_model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.plan_temperature,
        },
    ));
    let history = Arc::new(JsonFileHistorySource::new(
        config.workout_history_path.clone(),
        config.heart_rate_path.clone(),
    ));

    // --- 3. Build the Planner & Shared AppState ---
    let planner = Arc::new(PlanGenerator::new(
        history,
        model_loader,
        PlannerConfig {
            lookback_days: config.lookback_days,
            session: SessionConfig {
                display_every_n_tokens: config.display_every_n_tokens,
            },
        },
    ));
    let app_state = Arc::new(AppState::new(planner.clone()));

    // --- 4. Pre-load the Model in the Background ---
    tokio::spawn(async move {
        if let Err(e) = planner.ensure_loaded().await {
            error!("Model pre-load failed; it will be retried on the first request: {}", e);
        }
    });

    let origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid ALLOWED_ORIGIN '{}': {}", config.allowed_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/plans", post(request_plan_handler))
        .route("/plans/status", get(plan_status_handler))
        .route("/plans/output", get(plan_output_handler))
        .route("/schedule", get(schedule_handler))
        .route("/schedule/weeks/{week}", get(week_handler))
        .route("/schedule/weeks/{week}/days/{day}", get(day_handler))
        .route("/ws", get(ws_handler))
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
