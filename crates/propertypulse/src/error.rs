use std::path::PathBuf;
use thiserror::Error;

use crate::model::{JobStatus, RoomStageStatus};

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid adapter endpoint '{name}': {reason}")]
    InvalidEndpoint { name: String, reason: String },
}

/// Errors returned by the public orchestrator operations.
///
/// None of these change job state: a rejected request leaves the job exactly
/// as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Already in progress: {0}")]
    AlreadyInProgress(String),
}

impl From<StateError> for OrchestratorError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::UnknownRoom { .. } => OrchestratorError::InvalidInput(err.to_string()),
            other => OrchestratorError::InvalidState(other.to_string()),
        }
    }
}

/// Violations of the job or room state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Job is already {status}")]
    JobTerminal { status: JobStatus },

    #[error("Invalid job transition from {from} to {to}")]
    JobTransition { from: JobStatus, to: JobStatus },

    #[error("Invalid transition for room {index} from {from} to {to}")]
    RoomTransition {
        index: usize,
        from: RoomStageStatus,
        to: RoomStageStatus,
    },

    #[error("Room {index} does not exist")]
    UnknownRoom { index: usize },

    #[error("Rooms have already been created for this job")]
    RoomsAlreadyCreated,
}

pub type Result<T> = std::result::Result<T, PulseError>;
