//! Job and room state machines.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::{FloorplanAnalysis, RoomAnalysis};
use super::listing::{Photo, PropertyListing};
use crate::cost::{CostEstimate, RoomCost};
use crate::error::StateError;

// ─── Job status ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Extracting,
    Analyzing,
    Costing,
    Visualizing,
    Completed,
    Partial,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Partial | JobStatus::Failed
        )
    }

    fn stage_rank(self) -> Option<u8> {
        match self {
            JobStatus::Pending => Some(0),
            JobStatus::Extracting => Some(1),
            JobStatus::Analyzing => Some(2),
            JobStatus::Costing => Some(3),
            JobStatus::Visualizing => Some(4),
            _ => None,
        }
    }

    /// Forward-only transitions. FAILED is reachable from any non-terminal
    /// status; COMPLETED and PARTIAL only from VISUALIZING.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobStatus::Failed => true,
            JobStatus::Completed | JobStatus::Partial => self == JobStatus::Visualizing,
            _ => match (self.stage_rank(), next.stage_rank()) {
                (Some(from), Some(to)) => to == from + 1,
                _ => false,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Extracting => "EXTRACTING",
            JobStatus::Analyzing => "ANALYZING",
            JobStatus::Costing => "COSTING",
            JobStatus::Visualizing => "VISUALIZING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Partial => "PARTIAL",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let status = match s {
            "PENDING" => JobStatus::Pending,
            "EXTRACTING" => JobStatus::Extracting,
            "ANALYZING" => JobStatus::Analyzing,
            "COSTING" => JobStatus::Costing,
            "VISUALIZING" => JobStatus::Visualizing,
            "COMPLETED" => JobStatus::Completed,
            "PARTIAL" => JobStatus::Partial,
            "FAILED" => JobStatus::Failed,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Room status ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStageStatus {
    Pending,
    Analyzing,
    Analyzed,
    AnalysisFailed,
    Generating,
    Generated,
    GenerationFailed,
    Refining,
}

impl RoomStageStatus {
    pub fn can_transition_to(self, next: RoomStageStatus) -> bool {
        use RoomStageStatus::*;
        matches!(
            (self, next),
            (Pending, Analyzing)
                | (Analyzing, Analyzed)
                | (Analyzing, AnalysisFailed)
                | (Analyzed, Generating)
                | (Generating, Generated)
                | (Generating, GenerationFailed)
                | (Generated, Refining)
                | (GenerationFailed, Refining)
                | (Refining, Generated)
                | (Refining, GenerationFailed)
        )
    }

    /// An adapter call is (or is about to be) running for this room.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            RoomStageStatus::Analyzing | RoomStageStatus::Generating | RoomStageStatus::Refining
        )
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            RoomStageStatus::AnalysisFailed | RoomStageStatus::GenerationFailed
        )
    }

    pub fn is_refinable(self) -> bool {
        matches!(
            self,
            RoomStageStatus::Generated | RoomStageStatus::GenerationFailed
        )
    }
}

impl fmt::Display for RoomStageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoomStageStatus::Pending => "PENDING",
            RoomStageStatus::Analyzing => "ANALYZING",
            RoomStageStatus::Analyzed => "ANALYZED",
            RoomStageStatus::AnalysisFailed => "ANALYSIS_FAILED",
            RoomStageStatus::Generating => "GENERATING",
            RoomStageStatus::Generated => "GENERATED",
            RoomStageStatus::GenerationFailed => "GENERATION_FAILED",
            RoomStageStatus::Refining => "REFINING",
        };
        f.write_str(s)
    }
}

// ─── Visualization ──────────────────────────────────────────────────────────

/// An image returned by the visualization adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl GeneratedImage {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            mime_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationEntry {
    pub prompt: String,
    pub image: GeneratedImage,
    pub created_at: DateTime<Utc>,
}

impl VisualizationEntry {
    pub fn new(prompt: impl Into<String>, image: GeneratedImage) -> Self {
        Self {
            prompt: prompt.into(),
            image,
            created_at: Utc::now(),
        }
    }
}

/// Current generated image plus every earlier one, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    pub current: VisualizationEntry,
    #[serde(default)]
    pub history: Vec<VisualizationEntry>,
}

impl Visualization {
    pub fn new(entry: VisualizationEntry) -> Self {
        Self {
            current: entry,
            history: Vec::new(),
        }
    }

    /// Makes `entry` current, moving the previous one to the end of history.
    pub fn push(&mut self, entry: VisualizationEntry) {
        let previous = std::mem::replace(&mut self.current, entry);
        self.history.push(previous);
    }
}

// ─── Room state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub index: usize,
    pub label: String,
    pub photo: Photo,
    pub stage_status: RoomStageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<RoomAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_cost: Option<RoomCost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Visualization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RoomState {
    pub fn new(index: usize, photo: Photo) -> Self {
        Self {
            index,
            label: photo.label.clone(),
            photo,
            stage_status: RoomStageStatus::Pending,
            analysis: None,
            room_cost: None,
            visualization: None,
            error: None,
        }
    }

    pub fn transition(&mut self, next: RoomStageStatus) -> Result<(), StateError> {
        if !self.stage_status.can_transition_to(next) {
            return Err(StateError::RoomTransition {
                index: self.index,
                from: self.stage_status,
                to: next,
            });
        }
        self.stage_status = next;
        Ok(())
    }

    /// Records a generated image, keeping any earlier one in history.
    pub fn record_visualization(&mut self, entry: VisualizationEntry) {
        match self.visualization.as_mut() {
            Some(existing) => existing.push(entry),
            None => self.visualization = Some(Visualization::new(entry)),
        }
    }
}

// ─── Job ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    #[serde(default = "default_true")]
    pub generate_visuals: bool,
}

fn default_true() -> bool {
    true
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            generate_visuals: true,
        }
    }
}

/// One end-to-end analysis request for a single listing URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub url: String,
    pub status: JobStatus,
    #[serde(default)]
    pub options: JobOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing: Option<PropertyListing>,
    #[serde(default)]
    pub rooms: Vec<RoomState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floorplan: Option<FloorplanAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<CostEstimate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(url: impl Into<String>, options: JobOptions) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            status: JobStatus::Pending,
            options,
            listing: None,
            rooms: Vec::new(),
            floorplan: None,
            cost_estimate: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Terminal with no room generating or refining: nothing will write to
    /// this job again until a new refine starts.
    pub fn is_settled(&self) -> bool {
        self.is_terminal() && !self.rooms.iter().any(|r| r.stage_status.is_busy())
    }

    pub fn advance(&mut self, next: JobStatus) -> Result<(), StateError> {
        if self.status.is_terminal() {
            return Err(StateError::JobTerminal {
                status: self.status,
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(StateError::JobTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), StateError> {
        self.advance(JobStatus::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }

    /// Stores the listing and creates one PENDING room per photo. Rooms are
    /// created exactly once.
    pub fn attach_listing(&mut self, listing: PropertyListing) -> Result<usize, StateError> {
        if !self.rooms.is_empty() || self.listing.is_some() {
            return Err(StateError::RoomsAlreadyCreated);
        }
        self.rooms = listing
            .photos
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, photo)| RoomState::new(index, photo))
            .collect();
        self.listing = Some(listing);
        Ok(self.rooms.len())
    }

    pub fn room(&self, index: usize) -> Result<&RoomState, StateError> {
        self.rooms.get(index).ok_or(StateError::UnknownRoom { index })
    }

    pub fn room_mut(&mut self, index: usize) -> Result<&mut RoomState, StateError> {
        self.rooms
            .get_mut(index)
            .ok_or(StateError::UnknownRoom { index })
    }

    /// Indices and analyses of every room that reached ANALYZED or beyond.
    pub fn analyzed_rooms(&self) -> Vec<(usize, &RoomAnalysis)> {
        self.rooms
            .iter()
            .filter_map(|r| r.analysis.as_ref().map(|a| (r.index, a)))
            .collect()
    }

    /// The terminal status this job would finish with right now.
    pub fn final_status(&self) -> JobStatus {
        if self.rooms.is_empty() || self.rooms.iter().all(|r| r.stage_status.is_failed()) {
            return JobStatus::Failed;
        }
        if self.rooms.iter().any(|r| r.stage_status.is_failed()) {
            JobStatus::Partial
        } else {
            JobStatus::Completed
        }
    }

    /// Moves every busy room to the matching failed status and returns their
    /// indices. Used when the work driving those rooms has gone away.
    pub fn settle_busy_rooms(&mut self, reason: &str) -> Vec<usize> {
        let mut settled = Vec::new();
        for room in &mut self.rooms {
            let next = match room.stage_status {
                RoomStageStatus::Analyzing => RoomStageStatus::AnalysisFailed,
                RoomStageStatus::Generating | RoomStageStatus::Refining => {
                    RoomStageStatus::GenerationFailed
                }
                _ => continue,
            };
            room.stage_status = next;
            room.error = Some(reason.to_string());
            settled.push(room.index);
        }
        settled
    }

    /// Drops every per-room result and the cost estimate, and settles busy
    /// rooms so none is left in flight on a terminal job.
    pub fn discard_results(&mut self, reason: &str) {
        self.cost_estimate = None;
        self.floorplan = None;
        for room in &mut self.rooms {
            room.analysis = None;
            room.room_cost = None;
            room.visualization = None;
        }
        self.settle_busy_rooms(reason);
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            url: self.url.clone(),
            status: self.status,
            address: self.listing.as_ref().map(|l| l.address.clone()),
            price_text: self
                .listing
                .as_ref()
                .map(|l| l.price_text.clone())
                .filter(|p| !p.is_empty()),
            room_count: self.rooms.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Lightweight row for the recent-jobs listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub url: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_text: Option<String>,
    pub room_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
