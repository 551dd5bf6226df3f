//! Job state changes paired with the events that describe them.
//!
//! Every method mutates the job and appends exactly one event under the
//! job lock, then writes the job through to the database.

use std::sync::Arc;

use serde_json::json;

use crate::broadcast::{Event, EventDraft, JobHandle, JobStore, Stage};
use crate::cost::{format_pounds, CostEstimate};
use crate::error::StateError;
use crate::model::{
    FloorplanAnalysis, Job, JobStatus, PropertyListing, RoomAnalysis, RoomStageStatus,
    VisualizationEntry,
};

pub struct JobProgress {
    handle: Arc<JobHandle>,
    store: Arc<JobStore>,
}

impl JobProgress {
    pub fn new(handle: Arc<JobHandle>, store: Arc<JobStore>) -> Self {
        Self { handle, store }
    }

    pub fn job_id(&self) -> &str {
        self.handle.id()
    }

    pub fn snapshot(&self) -> Job {
        self.handle.snapshot()
    }

    /// Writes from the pipeline pass. Dropped once the job is terminal.
    fn commit_active<F>(&self, f: F) -> Result<Event, StateError>
    where
        F: FnOnce(&mut Job) -> Result<EventDraft, StateError>,
    {
        let event = self.handle.apply_active(f)?;
        self.store.persist(&self.handle);
        Ok(event)
    }

    /// Writes that are valid on a terminal job (refines).
    fn commit<F>(&self, f: F) -> Result<Event, StateError>
    where
        F: FnOnce(&mut Job) -> Result<EventDraft, StateError>,
    {
        let event = self.handle.apply(f)?;
        self.store.persist(&self.handle);
        Ok(event)
    }

    pub fn advance(
        &self,
        status: JobStatus,
        stage: Stage,
        message: impl Into<String>,
    ) -> Result<(), StateError> {
        let message = message.into();
        self.commit_active(|job| {
            job.advance(status)?;
            Ok(EventDraft::progress(stage, message).with_data(json!({ "status": status })))
        })?;
        Ok(())
    }

    /// Stores the listing and creates its rooms. Returns the room count.
    pub fn listing_extracted(&self, listing: PropertyListing) -> Result<usize, StateError> {
        let mut rooms = 0;
        self.commit_active(|job| {
            let address = listing.address.clone();
            let price_text = listing.price_text.clone();
            rooms = job.attach_listing(listing)?;
            Ok(EventDraft::progress(
                Stage::Extraction,
                format!("Found {} room photo(s) at {}", rooms, address),
            )
            .with_data(json!({
                "address": address,
                "priceText": price_text,
                "roomCount": rooms,
            })))
        })?;
        Ok(rooms)
    }

    /// Moves a room into a busy status ahead of an adapter call.
    pub fn room_started(
        &self,
        index: usize,
        next: RoomStageStatus,
        stage: Stage,
    ) -> Result<(), StateError> {
        self.commit_active(|job| {
            let room = job.room_mut(index)?;
            room.transition(next)?;
            room.error = None;
            let verb = match next {
                RoomStageStatus::Analyzing => "Analyzing",
                _ => "Generating renovation image for",
            };
            Ok(EventDraft::progress(stage, format!("{} {}", verb, room.label)).with_room(index))
        })?;
        Ok(())
    }

    pub fn room_analyzed(&self, index: usize, analysis: RoomAnalysis) -> Result<(), StateError> {
        self.commit_active(|job| {
            let room = job.room_mut(index)?;
            room.transition(RoomStageStatus::Analyzed)?;
            let message = format!(
                "{}: {} condition ({}/10)",
                room.label,
                analysis.condition_label(),
                analysis.condition_score
            );
            let data = json!({
                "roomType": analysis.room_type,
                "conditionScore": analysis.condition_score,
                "conditionLabel": analysis.condition_label(),
                "priority": analysis.priority,
                "issues": analysis.issues,
            });
            room.analysis = Some(analysis);
            Ok(EventDraft::room_result(Stage::Analysis, index, message).with_data(data))
        })?;
        Ok(())
    }

    /// Records a room-scoped failure. The job carries on.
    pub fn room_failed(
        &self,
        index: usize,
        stage: Stage,
        failed: RoomStageStatus,
        reason: impl Into<String>,
    ) -> Result<(), StateError> {
        let reason = reason.into();
        self.commit_active(|job| {
            let room = job.room_mut(index)?;
            room.transition(failed)?;
            room.error = Some(reason.clone());
            Ok(EventDraft::error(stage, format!("{}: {}", room.label, reason)).with_room(index))
        })?;
        Ok(())
    }

    /// Stores the estimate. `room_indices[k]` is the room priced by
    /// `estimate.rooms[k]`.
    pub fn floorplan_analyzed(&self, plan: FloorplanAnalysis) -> Result<(), StateError> {
        self.commit_active(|job| {
            let message = format!("Floor plan measured at {:.0} sqm", plan.total_sqm);
            let data = json!({
                "totalSqm": plan.total_sqm,
                "rooms": plan.rooms.len(),
            });
            job.floorplan = Some(plan);
            Ok(EventDraft::progress(Stage::Analysis, message).with_data(data))
        })?;
        Ok(())
    }

    pub fn costs_ready(
        &self,
        room_indices: &[usize],
        estimate: CostEstimate,
    ) -> Result<(), StateError> {
        self.commit_active(|job| {
            for (index, room_cost) in room_indices.iter().zip(&estimate.rooms) {
                job.room_mut(*index)?.room_cost = Some(room_cost.clone());
            }
            let message = format!(
                "Estimated renovation cost {} ({} - {})",
                format_pounds(estimate.grand_total.mid),
                format_pounds(estimate.grand_total.low),
                format_pounds(estimate.grand_total.high)
            );
            let data = json!({
                "region": estimate.property.region_name,
                "grandTotal": estimate.grand_total,
                "contingencyPercent": estimate.contingency_percent,
                "essentialItems": estimate.essential_works.len(),
            });
            job.cost_estimate = Some(estimate);
            Ok(EventDraft::cost_result(message).with_data(data))
        })?;
        Ok(())
    }

    pub fn room_generated(&self, index: usize, entry: VisualizationEntry) -> Result<(), StateError> {
        self.commit_active(|job| generated(job, index, Stage::Visualization, entry))?;
        Ok(())
    }

    /// Informational event with no state change.
    pub fn note(&self, stage: Stage, message: impl Into<String>) -> Result<(), StateError> {
        let message = message.into();
        self.commit_active(|_| Ok(EventDraft::progress(stage, message)))?;
        Ok(())
    }

    /// Fails the job with one terminal event.
    pub fn fail(&self, stage: Stage, reason: impl Into<String>) -> Result<(), StateError> {
        let reason = reason.into();
        self.commit_active(|job| {
            job.fail(reason.clone())?;
            Ok(EventDraft::terminal(stage, JobStatus::Failed, reason))
        })?;
        Ok(())
    }

    /// Settles the job into its final status with one terminal event.
    pub fn finalize(&self) -> Result<JobStatus, StateError> {
        let event = self.commit_active(|job| {
            let status = job.final_status();
            let failed = job.rooms.iter().filter(|r| r.stage_status.is_failed()).count();
            let message = match status {
                JobStatus::Completed => "Analysis complete".to_string(),
                JobStatus::Partial => {
                    format!("Analysis complete, {} of {} rooms failed", failed, job.rooms.len())
                }
                _ => "Every room failed, no usable results".to_string(),
            };
            if status == JobStatus::Failed {
                job.fail(message.clone())?;
            } else {
                job.advance(status)?;
            }
            Ok(EventDraft::terminal(Stage::Finalize, status, message))
        })?;
        Ok(event.status.unwrap_or(JobStatus::Failed))
    }

    /// Completes a refine: the room leaves REFINING either way.
    pub fn refine_finished(
        &self,
        index: usize,
        outcome: Result<VisualizationEntry, String>,
    ) -> Result<(), StateError> {
        self.commit(|job| match outcome {
            Ok(entry) => generated(job, index, Stage::Refine, entry),
            Err(reason) => {
                let room = job.room_mut(index)?;
                room.transition(RoomStageStatus::GenerationFailed)?;
                room.error = Some(reason.clone());
                Ok(EventDraft::error(Stage::Refine, format!("{}: {}", room.label, reason))
                    .with_room(index))
            }
        })?;
        Ok(())
    }
}

fn generated(
    job: &mut Job,
    index: usize,
    stage: Stage,
    entry: VisualizationEntry,
) -> Result<EventDraft, StateError> {
    let room = job.room_mut(index)?;
    room.transition(RoomStageStatus::Generated)?;
    room.error = None;
    let data = json!({
        "image": entry.image,
        "prompt": entry.prompt,
    });
    room.record_visualization(entry);
    let revisions = room.visualization.as_ref().map_or(0, |v| v.history.len());
    let message = if revisions == 0 {
        format!("{}: renovation image ready", room.label)
    } else {
        format!("{}: renovation image updated (revision {})", room.label, revisions + 1)
    };
    Ok(EventDraft::room_result(stage, index, message).with_data(data))
}
