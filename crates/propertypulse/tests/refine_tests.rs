//! Per-room refinement after a job has finished.

mod common;

use common::*;
use propertypulse::adapters::{AnalysisError, GenerationError};
use propertypulse::{EventKind, JobStatus, OrchestratorError, RoomStageStatus, Stage};

const ROOMS: &[&str] = &["Kitchen", "Bedroom", "Bathroom"];

async fn completed_job(harness: &TestHarness) -> String {
    let id = harness.start();
    harness.run_to_end(&id).await;
    id
}

#[tokio::test]
async fn test_refine_appends_history() {
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS))).build();
    let id = completed_job(&harness).await;
    let finished_at = harness.orchestrator.snapshot(&id).unwrap().updated_at;

    harness
        .orchestrator
        .refine(&id, 0, "  Scandinavian minimalism  ")
        .unwrap();
    let job = harness
        .wait_for(&id, |job| job.rooms[0].stage_status == RoomStageStatus::Generated)
        .await;

    let viz = job.rooms[0].visualization.as_ref().unwrap();
    assert_eq!(viz.current.prompt, "Scandinavian minimalism");
    assert_eq!(viz.current.image.reference, "render://Kitchen/2");
    assert_eq!(viz.history.len(), 1);
    assert_eq!(viz.history[0].image.reference, "render://Kitchen/1");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.updated_at, finished_at);

    let (_, prompt) = harness.visualizer.prompts().pop().unwrap();
    assert!(prompt.ends_with("Changes:\nScandinavian minimalism"));

    // A second refine keeps growing the history, oldest first.
    harness.orchestrator.refine(&id, 0, "Industrial loft").unwrap();
    let job = harness
        .wait_for(&id, |job| {
            job.rooms[0]
                .visualization
                .as_ref()
                .is_some_and(|v| v.history.len() == 2)
                && job.rooms[0].stage_status == RoomStageStatus::Generated
        })
        .await;
    let viz = job.rooms[0].visualization.as_ref().unwrap();
    assert_eq!(viz.current.prompt, "Industrial loft");
    assert_eq!(viz.history[1].prompt, "Scandinavian minimalism");
}

#[tokio::test]
async fn test_refine_events_follow_terminal_event() {
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS))).build();
    let id = completed_job(&harness).await;

    harness.orchestrator.refine(&id, 1, "Warm colours").unwrap();
    harness
        .wait_for(&id, |job| job.rooms[1].stage_status == RoomStageStatus::Generated)
        .await;

    let events = harness.run_to_end(&id).await;
    assert_well_formed(&events);

    let terminal_at = events.iter().position(|e| e.is_terminal()).unwrap();
    let refine_events: Vec<_> = events[terminal_at + 1..].iter().collect();
    assert_eq!(refine_events.len(), 2);
    assert!(refine_events
        .iter()
        .all(|e| e.stage == Stage::Refine && e.room_index == Some(1)));
    assert_eq!(refine_events[1].kind, EventKind::RoomResult);
}

#[tokio::test]
async fn test_refine_recovers_failed_generation() {
    let visualizer =
        FakeVisualizer::new().always_fail("Bedroom", GenerationError::Unavailable("down".to_string()));
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS)))
        .visualizer(visualizer)
        .build();
    let id = completed_job(&harness).await;
    assert_eq!(
        harness.orchestrator.snapshot(&id).unwrap().status,
        JobStatus::Partial
    );

    harness.visualizer.heal("Bedroom");
    harness.orchestrator.refine(&id, 1, "Bright and airy").unwrap();
    let job = harness
        .wait_for(&id, |job| job.rooms[1].stage_status == RoomStageStatus::Generated)
        .await;

    assert!(job.rooms[1].error.is_none());
    assert!(job.rooms[1].visualization.as_ref().unwrap().history.is_empty());
    // Job status is fixed once terminal.
    assert_eq!(job.status, JobStatus::Partial);
}

#[tokio::test]
async fn test_failed_refine_keeps_previous_image() {
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS))).build();
    let id = completed_job(&harness).await;

    harness
        .visualizer
        .break_label("Kitchen", GenerationError::Rejected("unsafe prompt".to_string()));
    harness.orchestrator.refine(&id, 0, "Something odd").unwrap();
    let job = harness
        .wait_for(&id, |job| {
            job.rooms[0].stage_status == RoomStageStatus::GenerationFailed
        })
        .await;

    let room = &job.rooms[0];
    assert!(room.error.as_deref().unwrap().contains("unsafe prompt"));
    let viz = room.visualization.as_ref().unwrap();
    assert_eq!(viz.current.image.reference, "render://Kitchen/1");
    assert!(viz.history.is_empty());
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_refine_rejected_while_generating() {
    let gate = Gate::closed();
    let visualizer = FakeVisualizer::new().with_gate(gate.clone());
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS)))
        .visualizer(visualizer)
        .build();
    let id = harness.start();

    harness
        .wait_for(&id, |job| {
            job.rooms
                .first()
                .is_some_and(|r| r.stage_status == RoomStageStatus::Generating)
        })
        .await;

    let before = harness.orchestrator.snapshot(&id).unwrap();
    let err = harness.orchestrator.refine(&id, 0, "Modern").unwrap_err();
    assert!(matches!(err, OrchestratorError::AlreadyInProgress(_)));
    assert_eq!(harness.orchestrator.snapshot(&id).unwrap(), before);

    gate.release();
    let events = harness.run_to_end(&id).await;
    assert_eq!(events.last().unwrap().status, Some(JobStatus::Completed));
}

#[tokio::test]
async fn test_refine_rejected_while_analyzing() {
    let gate = Gate::closed();
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS)))
        .analyzer(FakeAnalyzer::new().with_gate(gate.clone()))
        .build();
    let id = harness.start();

    harness
        .wait_for(&id, |job| {
            job.rooms
                .first()
                .is_some_and(|r| r.stage_status == RoomStageStatus::Analyzing)
        })
        .await;

    let before = harness.orchestrator.snapshot(&id).unwrap();
    let err = harness.orchestrator.refine(&id, 0, "Modern").unwrap_err();
    assert!(matches!(err, OrchestratorError::AlreadyInProgress(_)));
    assert_eq!(harness.orchestrator.snapshot(&id).unwrap(), before);
    assert_eq!(harness.visualizer.prompts().len(), 0);

    gate.release();
    let events = harness.run_to_end(&id).await;
    assert_eq!(events.last().unwrap().status, Some(JobStatus::Completed));
}

#[tokio::test]
async fn test_refine_rejected_while_refining() {
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS))).build();
    let id = completed_job(&harness).await;

    harness.visualizer.gate.close();
    harness.orchestrator.refine(&id, 2, "Spa bathroom").unwrap();
    assert_eq!(
        harness.orchestrator.snapshot(&id).unwrap().rooms[2].stage_status,
        RoomStageStatus::Refining
    );

    let err = harness.orchestrator.refine(&id, 2, "Other idea").unwrap_err();
    assert!(matches!(err, OrchestratorError::AlreadyInProgress(_)));

    // Other rooms can still be refined.
    harness.orchestrator.refine(&id, 0, "Open plan").unwrap();

    harness.visualizer.gate.release();
    let job = harness
        .wait_for(&id, |job| {
            job.rooms[0].stage_status == RoomStageStatus::Generated
                && job.rooms[2].stage_status == RoomStageStatus::Generated
        })
        .await;
    assert_eq!(
        job.rooms[2].visualization.as_ref().unwrap().current.prompt,
        "Spa bathroom"
    );
}

#[tokio::test]
async fn test_refine_rejected_before_job_finishes() {
    let gate = Gate::closed();
    let analyzer =
        FakeAnalyzer::new().always_fail("Bathroom", AnalysisError::Rejected("blurry".to_string()));
    let visualizer = FakeVisualizer::new().with_gate(gate.clone());
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS)))
        .analyzer(analyzer)
        .visualizer(visualizer)
        .build();
    let id = harness.start();

    harness
        .wait_for(&id, |job| job.status == JobStatus::Visualizing)
        .await;

    let err = harness.orchestrator.refine(&id, 2, "Anything").unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState(_)));

    gate.release();
    harness.run_to_end(&id).await;
}

#[tokio::test]
async fn test_refine_rejects_room_without_image() {
    let analyzer =
        FakeAnalyzer::new().always_fail("Bathroom", AnalysisError::Rejected("blurry".to_string()));
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS)))
        .analyzer(analyzer)
        .build();
    let id = completed_job(&harness).await;

    let err = harness.orchestrator.refine(&id, 2, "Anything").unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState(_)));
    assert_eq!(
        harness.orchestrator.snapshot(&id).unwrap().rooms[2].stage_status,
        RoomStageStatus::AnalysisFailed
    );
}

#[tokio::test]
async fn test_refine_input_validation() {
    let harness = TestHarness::builder(FakeExtractor::returning(listing(ROOMS))).build();
    let id = completed_job(&harness).await;

    assert!(matches!(
        harness.orchestrator.refine(&id, 0, "   ").unwrap_err(),
        OrchestratorError::InvalidInput(_)
    ));
    assert!(matches!(
        harness.orchestrator.refine(&id, 3, "Modern").unwrap_err(),
        OrchestratorError::InvalidInput(_)
    ));
    assert!(matches!(
        harness.orchestrator.refine("missing", 0, "Modern").unwrap_err(),
        OrchestratorError::NotFound(_)
    ));
}
