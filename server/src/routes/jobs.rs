//! Job endpoints: submit, inspect, stream, refine, cancel, delete.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use propertypulse::model::JobSummary;
use propertypulse::{Event, Job, JobStatus, StartOptions};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const DEFAULT_RECENT_LIMIT: usize = 20;
const MAX_RECENT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub url: String,
    #[serde(default)]
    pub generate_visuals: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeAccepted {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    pub prompt: String,
    /// Architectural style to render in, overriding the detected one.
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefineAccepted {
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(start_analysis))
        .route("/analyze/{id}", get(get_job).delete(delete_job))
        .route("/analyze/{id}/stream", get(stream_job))
        .route("/analyze/{id}/refine/{room}", post(refine_room))
        .route("/analyze/{id}/cancel", post(cancel_job))
        .route("/jobs/recent", get(recent_jobs))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

async fn start_analysis(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AnalyzeAccepted>)> {
    let request = body(payload)?;
    let options = StartOptions {
        generate_visuals: request.generate_visuals,
    };
    let job_id = state.orchestrator.start_with(&request.url, options)?;
    let status = state.orchestrator.snapshot(&job_id)?.status;
    Ok((StatusCode::ACCEPTED, Json(AnalyzeAccepted { job_id, status })))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Job>> {
    Ok(Json(state.orchestrator.snapshot(&id)?))
}

/// Replays the job's events and follows it live. The stream closes once the
/// job is terminal and nothing is left in flight.
async fn stream_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let subscription = state.orchestrator.subscribe(&id)?;
    let events = subscription
        .into_stream()
        .filter_map(|event| async move { to_sse(&event).map(Ok) });
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}

fn to_sse(event: &Event) -> Option<SseEvent> {
    match SseEvent::default()
        .event(event.kind.as_str())
        .id(event.seq.to_string())
        .json_data(event)
    {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::warn!(seq = event.seq, error = %e, "Failed to encode event");
            None
        }
    }
}

async fn refine_room(
    State(state): State<AppState>,
    Path((id, room)): Path<(String, String)>,
    payload: Result<Json<RefineRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RefineAccepted>)> {
    let room_index: usize = room
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid room index '{}'", room)))?;
    let request = body(payload)?;
    state
        .orchestrator
        .refine_with(&id, room_index, &request.prompt, request.style.as_deref())?;
    Ok((StatusCode::ACCEPTED, Json(RefineAccepted { accepted: true })))
}

async fn cancel_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Job>> {
    Ok(Json(state.orchestrator.cancel(&id)?))
}

async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    state.orchestrator.delete(&id)?;
    Ok(Json(DeleteResponse { status: "deleted" }))
}

async fn recent_jobs(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<JobSummary>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    Json(state.orchestrator.list_recent(limit))
}
