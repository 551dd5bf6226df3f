//! HTTP surface exercised in-process with the demo adapters.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use propertypulse::{Adapters, JobStore, Orchestrator, OrchestratorSettings, Stage};
use propertypulse_server::{build_router, AppState};

const LISTING_URL: &str = "https://www.rightmove.co.uk/properties/98765";

fn app() -> (Router, Orchestrator) {
    let orchestrator = Orchestrator::new(
        Arc::new(JobStore::default()),
        Adapters::demo(),
        OrchestratorSettings::default(),
    );
    let state = AppState::new(orchestrator.clone(), Duration::from_secs(15));
    (build_router(state, &[]), orchestrator)
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn submit(app: &Router) -> String {
    let (status, body) = send(
        app,
        request(Method::POST, "/analyze", Some(json!({ "url": LISTING_URL }))),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    body["jobId"].as_str().unwrap().to_string()
}

async fn finish(orchestrator: &Orchestrator, id: &str) {
    let mut subscription = orchestrator.subscribe(id).unwrap();
    tokio::time::timeout(Duration::from_secs(10), async {
        while subscription.next().await.is_some() {}
    })
    .await
    .expect("job did not finish in time");
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(&app, request(Method::GET, "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pool"]["limit"], 2);
    assert_eq!(body["pool"]["inFlight"], 0);
    assert_eq!(body["jobs"], 0);
    assert_eq!(body["activeJobs"], 0);
}

#[tokio::test]
async fn test_submit_and_fetch_job() {
    let (app, orchestrator) = app();
    let id = submit(&app).await;
    finish(&orchestrator, &id).await;

    let (status, job) = send(&app, request(Method::GET, &format!("/analyze/{}", id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["id"], id.as_str());
    assert_eq!(job["status"], "COMPLETED");
    assert_eq!(job["rooms"].as_array().unwrap().len(), 5);
    assert!(job["costEstimate"]["grandTotal"]["mid"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_submit_rejects_bad_input() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        request(Method::POST, "/analyze", Some(json!({ "url": "https://example.com/1" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = send(
        &app,
        request(Method::POST, "/analyze", Some(json!({ "link": LISTING_URL }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let (app, _) = app();
    for (method, uri) in [
        (Method::GET, "/analyze/nope"),
        (Method::GET, "/analyze/nope/stream"),
        (Method::POST, "/analyze/nope/cancel"),
        (Method::DELETE, "/analyze/nope"),
    ] {
        let (status, body) = send(&app, request(method, uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_stream_replays_finished_job() {
    let (app, orchestrator) = app();
    let id = submit(&app).await;
    finish(&orchestrator, &id).await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, &format!("/analyze/{}/stream", id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("event: progress"));
    assert!(text.contains("event: room-result"));
    assert!(text.contains("event: cost-result"));
    assert!(text.contains("event: terminal"));
    assert!(text.contains("id: 0\n"));

    let events = orchestrator.store().get(&id).unwrap().event_count();
    assert_eq!(text.matches("\nid: ").count(), events);
}

#[tokio::test]
async fn test_refine_flow() {
    let (app, orchestrator) = app();
    let id = submit(&app).await;
    finish(&orchestrator, &id).await;

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/analyze/{}/refine/1", id),
            Some(json!({ "prompt": "Scandinavian minimalism" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "accepted": true }));
    finish(&orchestrator, &id).await;

    let job = orchestrator.snapshot(&id).unwrap();
    let viz = job.rooms[1].visualization.as_ref().unwrap();
    assert_eq!(viz.current.prompt, "Scandinavian minimalism");
    assert_eq!(viz.history.len(), 1);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/analyze/{}/refine/99", id),
            Some(json!({ "prompt": "x" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            &format!("/analyze/{}/refine/abc", id),
            Some(json!({ "prompt": "x" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refine_with_style() {
    let (app, orchestrator) = app();
    let id = submit(&app).await;
    finish(&orchestrator, &id).await;

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/analyze/{}/refine/0", id),
            Some(json!({ "prompt": "x", "style": "brutalist" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            &format!("/analyze/{}/refine/0", id),
            Some(json!({ "prompt": "Restore the fireplace", "style": "Victorian" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    finish(&orchestrator, &id).await;

    let events = orchestrator.store().get(&id).unwrap().events();
    let started = events
        .iter()
        .find(|e| e.stage == Stage::Refine && e.room_index == Some(0))
        .unwrap();
    assert_eq!(started.data.as_ref().unwrap()["style"], "victorian");
}

#[tokio::test]
async fn test_cancel_finished_job_conflicts() {
    let (app, orchestrator) = app();
    let id = submit(&app).await;
    finish(&orchestrator, &id).await;

    let (status, body) = send(&app, request(Method::POST, &format!("/analyze/{}/cancel", id), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_delete_and_recent() {
    let (app, orchestrator) = app();
    let first = submit(&app).await;
    let second = submit(&app).await;
    finish(&orchestrator, &first).await;
    finish(&orchestrator, &second).await;

    let (status, body) = send(&app, request(Method::GET, "/jobs/recent?limit=10", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, request(Method::DELETE, &format!("/analyze/{}", first), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "deleted" }));

    let (status, _) = send(&app, request(Method::GET, &format!("/analyze/{}", first), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, request(Method::GET, "/jobs/recent", None)).await;
    let recent = body.as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["id"], second.as_str());
}
