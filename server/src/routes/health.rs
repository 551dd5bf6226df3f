use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub limit: usize,
    pub in_flight: usize,
    pub peak: usize,
    pub closed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub pool: PoolStatus,
    pub jobs: usize,
    pub active_jobs: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pool = state.orchestrator.pool();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        pool: PoolStatus {
            limit: pool.limit(),
            in_flight: pool.in_flight(),
            peak: pool.peak(),
            closed: pool.is_closed(),
        },
        jobs: state.orchestrator.store().len(),
        active_jobs: state.orchestrator.active_jobs(),
    })
}
