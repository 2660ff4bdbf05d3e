use crate::config::ServerConfig;
use crate::engine::{spawn_tick_loop, SharedEngine};
use crate::store::JsonLinesStore;
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{CarryoverSummary, ControlAck, ControlSignal, WorldSnapshot};
use sim::{EpochController, SimConfig};
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/snapshot", get(handle_snapshot))
        .route("/api/record", get(handle_record))
        .route("/api/control/advance", post(handle_advance))
        .route("/api/control/restart", post(handle_restart))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let store = JsonLinesStore::new(&config.records_path);
    tracing::info!("Carryover records at {}", store.path().display());

    let mut rng = StdRng::from_entropy();
    let controller = EpochController::new(SimConfig::default(), Box::new(store), &mut rng);
    let engine = SharedEngine::new(controller);
    let ticker = spawn_tick_loop(engine.clone(), config.tick_interval);

    let app = router(AppState { engine });
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    tracing::info!("Server listening on {}", config.addr);

    let served = axum::serve(listener, app).await.context("server stopped");
    ticker.abort();
    served
}

async fn handle_snapshot(State(state): State<AppState>) -> Json<WorldSnapshot> {
    Json(state.engine.snapshot().await)
}

async fn handle_record(State(state): State<AppState>) -> Json<CarryoverSummary> {
    Json(state.engine.carryover().await)
}

/// 409 when an epoch is already running
async fn handle_advance(State(state): State<AppState>) -> (StatusCode, Json<ControlAck>) {
    let ack = state.engine.signal(ControlSignal::Advance).await;
    let status = if ack.accepted {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    (status, Json(ack))
}

async fn handle_restart(State(state): State<AppState>) -> Json<ControlAck> {
    Json(state.engine.signal(ControlSignal::Restart).await)
}

async fn health() -> &'static str {
    "ok"
}
