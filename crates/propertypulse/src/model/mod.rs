//! Domain types shared by the orchestrator, the adapters and the cost engine.

pub mod analysis;
pub mod job;
pub mod listing;

pub use analysis::{
    FloorplanAnalysis, FloorplanRoom, Priority, RenovationItem, RoomAnalysis, WorkScope,
};
pub use job::{
    GeneratedImage, Job, JobOptions, JobStatus, JobSummary, RoomStageStatus, RoomState,
    Visualization, VisualizationEntry,
};
pub use listing::{Photo, PropertyListing};
