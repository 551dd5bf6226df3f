//! Per-job event logs and the job store that owns them.
//!
//! Every state change of a job is paired with exactly one appended event, and
//! both happen under the job's lock. Subscribers replay the log and then
//! follow a broadcast channel for the live tail.

pub mod event;
pub mod event_log;
pub mod job_store;

pub use event::{Event, EventDraft, EventKind, Stage};
pub use event_log::{EventLog, EventSubscription};
pub use job_store::{JobHandle, JobStore};
