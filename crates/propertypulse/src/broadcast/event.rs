use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::JobStatus;

/// Pipeline phase an event belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Submission,
    Extraction,
    Analysis,
    Costing,
    Visualization,
    Refine,
    Finalize,
}

impl Stage {
    /// The stage a job in `status` is working through.
    pub fn for_status(status: JobStatus) -> Stage {
        match status {
            JobStatus::Pending => Stage::Submission,
            JobStatus::Extracting => Stage::Extraction,
            JobStatus::Analyzing => Stage::Analysis,
            JobStatus::Costing => Stage::Costing,
            JobStatus::Visualizing => Stage::Visualization,
            JobStatus::Completed | JobStatus::Partial | JobStatus::Failed => Stage::Finalize,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Submission => write!(f, "Submission"),
            Stage::Extraction => write!(f, "Extraction"),
            Stage::Analysis => write!(f, "Analysis"),
            Stage::Costing => write!(f, "Costing"),
            Stage::Visualization => write!(f, "Visualization"),
            Stage::Refine => write!(f, "Refine"),
            Stage::Finalize => write!(f, "Finalize"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Progress,
    RoomResult,
    CostResult,
    Error,
    Terminal,
}

impl EventKind {
    /// Name used for the SSE `event:` field.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Progress => "progress",
            EventKind::RoomResult => "room-result",
            EventKind::CostResult => "cost-result",
            EventKind::Error => "error",
            EventKind::Terminal => "terminal",
        }
    }
}

/// One immutable entry of a job's event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Position in the job's log, starting at 0.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub stage: Stage,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_index: Option<usize>,
    pub message: String,
    /// Final job status. Only set on terminal events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Event {
    pub fn is_terminal(&self) -> bool {
        self.kind == EventKind::Terminal
    }
}

/// An event before it is given a sequence number by the log.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub stage: Stage,
    pub kind: EventKind,
    pub room_index: Option<usize>,
    pub message: String,
    pub status: Option<JobStatus>,
    pub data: Option<Value>,
}

impl EventDraft {
    fn new(stage: Stage, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            room_index: None,
            message: message.into(),
            status: None,
            data: None,
        }
    }

    pub fn progress(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, EventKind::Progress, message)
    }

    pub fn room_result(stage: Stage, room_index: usize, message: impl Into<String>) -> Self {
        Self::new(stage, EventKind::RoomResult, message).with_room(room_index)
    }

    pub fn cost_result(message: impl Into<String>) -> Self {
        Self::new(Stage::Costing, EventKind::CostResult, message)
    }

    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, EventKind::Error, message)
    }

    pub fn terminal(stage: Stage, status: JobStatus, message: impl Into<String>) -> Self {
        let mut draft = Self::new(stage, EventKind::Terminal, message);
        draft.status = Some(status);
        draft
    }

    pub fn with_room(mut self, room_index: usize) -> Self {
        self.room_index = Some(room_index);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn into_event(self, seq: u64) -> Event {
        Event {
            seq,
            timestamp: Utc::now(),
            stage: self.stage,
            kind: self.kind,
            room_index: self.room_index,
            message: self.message,
            status: self.status,
            data: self.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_wire_names() {
        let json = serde_json::to_string(&EventKind::RoomResult).unwrap();
        assert_eq!(json, "\"room-result\"");
        assert_eq!(EventKind::CostResult.as_str(), "cost-result");
    }

    #[test]
    fn test_terminal_draft_carries_status() {
        let event = EventDraft::terminal(Stage::Finalize, JobStatus::Partial, "done").into_event(7);
        assert!(event.is_terminal());
        assert_eq!(event.seq, 7);
        assert_eq!(event.status, Some(JobStatus::Partial));
    }

    #[test]
    fn test_event_serialization_skips_empty_fields() {
        let event = EventDraft::room_result(Stage::Analysis, 2, "Kitchen analyzed")
            .with_data(json!({"conditionScore": 4}))
            .into_event(3);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["roomIndex"], 2);
        assert_eq!(value["kind"], "room-result");
        assert_eq!(value["stage"], "analysis");
        assert_eq!(value["data"]["conditionScore"], 4);
        assert!(value.get("status").is_none());
    }
}
