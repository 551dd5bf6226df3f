use std::time::Duration;

use propertypulse::Orchestrator;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Interval between SSE keep-alive comments.
    pub keep_alive: Duration,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, keep_alive: Duration) -> Self {
        Self {
            orchestrator,
            keep_alive,
        }
    }
}
