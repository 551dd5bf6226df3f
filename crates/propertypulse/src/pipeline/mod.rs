//! The staged analysis pipeline and the machinery it runs on.

pub mod pool;
pub mod progress;
pub mod prompt;
pub mod retry;
pub mod runner;

pub use pool::{PoolClosed, WorkerPool};
pub use progress::JobProgress;
pub use prompt::{image_prompt, renovation_prompt, styled_image_prompt, ArchitecturalStyle};
pub use retry::{Backoff, CallError, RetryPolicy};
pub use runner::{Pipeline, NO_ANALYZED_ROOMS, NO_PHOTOS};
