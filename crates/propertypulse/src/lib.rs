pub mod adapters;
pub mod broadcast;
pub mod config;
pub mod cost;
pub mod db;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pipeline;

pub use adapters::{Adapters, Analyzer, Extractor, Visualizer};
pub use broadcast::{Event, EventKind, EventSubscription, JobHandle, JobStore, Stage};
pub use config::{load_config, Config};
pub use cost::{CostEngine, CostEstimate, Region};
pub use error::{ConfigError, OrchestratorError, PulseError, Result, StateError};
pub use model::{Job, JobStatus, PropertyListing, RoomAnalysis, RoomStageStatus, RoomState};
pub use orchestrator::{Orchestrator, OrchestratorSettings, StartOptions};
pub use pipeline::{RetryPolicy, WorkerPool};
