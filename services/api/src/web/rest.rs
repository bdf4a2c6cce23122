//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{plan_task::plan_process, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use training_plan_core::LoadState;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        request_plan_handler,
        plan_status_handler,
        plan_output_handler,
        schedule_handler,
        week_handler,
        day_handler,
    ),
    components(
        schemas(PlanRequestResponse, PlanStatusResponse)
    ),
    tags(
        (name = "Training Plan API", description = "Generate and browse AI-written running plans.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The response payload sent after asking for a new plan.
#[derive(Serialize, ToSchema)]
pub struct PlanRequestResponse {
    /// False when a generation was already running and the request was ignored.
    started: bool,
}

/// A point-in-time view of the generation session.
#[derive(Serialize, ToSchema)]
pub struct PlanStatusResponse {
    running: bool,
    model_loaded: bool,
    model: Option<String>,
    input_tokens: usize,
    output_tokens: usize,
    stat: String,
    weeks: usize,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Start generating a new training plan.
///
/// Returns immediately; progress is streamed over `/ws`. `started` reflects the
/// session at request time; a request that races another one is reported over
/// `/ws` as `generation_skipped`.
#[utoipa::path(
    post,
    path = "/plans",
    responses(
        (status = 202, description = "Request accepted", body = PlanRequestResponse)
    )
)]
pub async fn request_plan_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = !app_state.planner.session().is_running();
    if started {
        tokio::spawn(plan_process(app_state.clone()));
    }
    (StatusCode::ACCEPTED, Json(PlanRequestResponse { started }))
}

/// Report the state of the model session.
#[utoipa::path(
    get,
    path = "/plans/status",
    responses(
        (status = 200, description = "Current session status", body = PlanStatusResponse)
    )
)]
pub async fn plan_status_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let planner = &app_state.planner;
    let snapshot = planner.snapshot();
    let model = match planner.session().load_state() {
        LoadState::Loaded { model } => Some(model),
        LoadState::Unloaded => None,
    };
    Json(PlanStatusResponse {
        running: snapshot.running,
        model_loaded: model.is_some(),
        model,
        input_tokens: snapshot.input_tokens,
        output_tokens: snapshot.output_tokens,
        stat: snapshot.stat,
        weeks: planner.schedule().await.weeks.len(),
    })
}

/// The raw text of the last generation, including failure notices.
#[utoipa::path(
    get,
    path = "/plans/output",
    responses(
        (status = 200, description = "Raw model output", content_type = "text/plain", body = String)
    )
)]
pub async fn plan_output_handler(State(app_state): State<Arc<AppState>>) -> String {
    app_state.planner.last_output()
}

/// The stored schedule, in the same JSON shape the model is asked to produce.
#[utoipa::path(
    get,
    path = "/schedule",
    responses(
        (status = 200, description = "The current schedule; empty until a plan succeeds")
    )
)]
pub async fn schedule_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.planner.schedule().await)
}

/// A single week of the stored schedule.
#[utoipa::path(
    get,
    path = "/schedule/weeks/{week}",
    params(
        ("week" = u32, Path, description = "The week number, starting at 1.")
    ),
    responses(
        (status = 200, description = "The requested week"),
        (status = 404, description = "No such week")
    )
)]
pub async fn week_handler(
    State(app_state): State<Arc<AppState>>,
    Path(week): Path<u32>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .planner
        .week(week)
        .await
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Week {} not found", week)))
}

/// A single day of the stored schedule.
#[utoipa::path(
    get,
    path = "/schedule/weeks/{week}/days/{day}",
    params(
        ("week" = u32, Path, description = "The week number, starting at 1."),
        ("day" = u8, Path, description = "The day within the week, 1 to 7.")
    ),
    responses(
        (status = 200, description = "The requested day"),
        (status = 404, description = "No such day")
    )
)]
pub async fn day_handler(
    State(app_state): State<Arc<AppState>>,
    Path((week, day)): Path<(u32, u8)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .planner
        .day(week, day)
        .await
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("Day {} of week {} not found", day, week),
            )
        })
}
