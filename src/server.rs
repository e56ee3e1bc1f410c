//! Read-only status API: axum router and request handlers.
//!
//! The control loop runs on a plain `std::thread` and publishes a
//! [`ControllerStatus`] snapshot once per tick. The server runs on the
//! tokio runtime and only ever reads that snapshot, so a slow client can
//! never stall the display.
//!
//! ## Rust concepts
//! - axum extractors: `State`
//! - `Arc<Mutex<T>>` shared with the control thread
//! - `Result<Json<T>, (StatusCode, String)>` for handlers that can 404

use crate::clock::ClockReading;
use crate::config::Units;
use crate::controller::ControllerStatus;
use crate::mode::ModeKind;
use crate::weather::WeatherReading;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use std::sync::{Arc, Mutex, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    /// Snapshot written by the control thread
    pub status: Arc<Mutex<ControllerStatus>>,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(get_status, get_weather),
    components(schemas(ControllerStatus, ModeKind, ClockReading, WeatherReading, Units)),
    tags(
        (name = "system", description = "Controller status"),
        (name = "weather", description = "Cached weather data"),
    ),
    info(
        title = "Matrix Weather API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Status of the LED matrix weather display"
    )
)]
pub struct ApiDoc;

// ── Router ───────────────────────────────────────────────────────────

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(
                    utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
                        .validator_url("none"),
                ),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/weather", get(get_weather))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

fn snapshot(state: &AppState) -> ControllerStatus {
    state
        .status
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// GET /api/v1/status: current mode, sync ages, last failure
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Controller status", body = ControllerStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<ControllerStatus> {
    Json(snapshot(&state))
}

/// GET /api/v1/weather: last successfully fetched reading
#[utoipa::path(
    get,
    path = "/api/v1/weather",
    tag = "weather",
    responses(
        (status = 200, description = "Cached weather reading", body = WeatherReading),
        (status = 404, description = "No weather fetched yet")
    )
)]
async fn get_weather(
    State(state): State<AppState>,
) -> Result<Json<WeatherReading>, (StatusCode, String)> {
    snapshot(&state).weather.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            "No weather fetched yet".to_string(),
        )
    })
}
