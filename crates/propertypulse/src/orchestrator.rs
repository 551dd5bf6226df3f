//! Public entry point: starts, cancels, refines and observes jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::adapters::Adapters;
use crate::broadcast::{EventDraft, EventSubscription, JobHandle, JobStore, Stage};
use crate::config::Config;
use crate::error::{OrchestratorError, StateError};
use crate::model::{Job, JobOptions, JobStatus, JobSummary};
use crate::pipeline::{ArchitecturalStyle, JobProgress, Pipeline, RetryPolicy, WorkerPool};

pub const CANCELLED_REASON: &str = "Cancelled by user";

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Global limit on in-flight adapter calls.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Listing hosts accepted by `start`; empty accepts any host.
    pub allowed_hosts: Vec<String>,
    pub generate_visuals: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            concurrency: 2,
            retry: RetryPolicy::default(),
            allowed_hosts: vec!["rightmove.co.uk".to_string()],
            generate_visuals: true,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.pipeline.concurrency,
            retry: RetryPolicy::from_config(&config.retry),
            allowed_hosts: config.listing.allowed_hosts.clone(),
            generate_visuals: config.pipeline.generate_visuals,
        }
    }
}

/// Per-submission overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub generate_visuals: Option<bool>,
}

struct Inner {
    store: Arc<JobStore>,
    pipeline: Arc<Pipeline>,
    settings: OrchestratorSettings,
    /// One token per job with work in flight; cancelled on cancel, delete or
    /// shutdown. Dropped once the job settles.
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

/// Cheap to clone; all clones share the same jobs and worker pool.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(store: Arc<JobStore>, adapters: Adapters, settings: OrchestratorSettings) -> Self {
        let pool = Arc::new(WorkerPool::new(settings.concurrency));
        let pipeline = Pipeline::new(pool, adapters, settings.retry);
        Self::with_pipeline(store, pipeline, settings)
    }

    pub fn with_pipeline(
        store: Arc<JobStore>,
        pipeline: Pipeline,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                pipeline: Arc::new(pipeline),
                settings,
                tokens: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.inner.store
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        self.inner.pipeline.pool()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        match self.inner.tokens.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Cancellation token map lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn token_for(&self, id: &str) -> CancellationToken {
        self.tokens().entry(id.to_string()).or_default().clone()
    }

    /// Forgets the job's token once nothing can write to the job any more.
    /// The map lock is held across the check so a refine that starts
    /// meanwhile either keeps the token or gets a fresh one.
    fn release_token(&self, id: &str) {
        let mut tokens = self.tokens();
        let settled = self
            .inner
            .store
            .get(id)
            .map_or(true, |handle| handle.is_settled());
        if settled && tokens.remove(id).is_some() {
            log::debug!("Released cancellation token for job {}", id);
        }
    }

    /// Number of jobs that currently hold a cancellation token.
    pub fn active_jobs(&self) -> usize {
        self.tokens().len()
    }

    fn handle(&self, id: &str) -> Result<Arc<JobHandle>, OrchestratorError> {
        self.inner
            .store
            .get(id)
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    fn progress(&self, handle: Arc<JobHandle>) -> JobProgress {
        JobProgress::new(handle, Arc::clone(&self.inner.store))
    }

    // ─── Operations ─────────────────────────────────────────────────────────

    /// Accepts an absolute http(s) URL on one of the allowed listing hosts.
    pub fn validate_url(&self, url: &str) -> Result<String, OrchestratorError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(OrchestratorError::InvalidInput("URL is required".to_string()));
        }

        let parsed = url::Url::parse(trimmed)
            .map_err(|e| OrchestratorError::InvalidInput(format!("Malformed URL '{}': {}", trimmed, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(OrchestratorError::InvalidInput(format!(
                "Unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| OrchestratorError::InvalidInput("URL has no host".to_string()))?
            .to_ascii_lowercase();

        let allowed = &self.inner.settings.allowed_hosts;
        let host_allowed = allowed.is_empty()
            || allowed.iter().any(|a| {
                let a = a.trim().to_ascii_lowercase();
                host == a || host.ends_with(&format!(".{}", a))
            });
        if !host_allowed {
            return Err(OrchestratorError::InvalidInput(format!(
                "Not a supported listing site: {}",
                host
            )));
        }

        Ok(parsed.to_string())
    }

    /// Creates a job and launches its pipeline pass in the background.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, url: &str) -> Result<String, OrchestratorError> {
        self.start_with(url, StartOptions::default())
    }

    pub fn start_with(&self, url: &str, options: StartOptions) -> Result<String, OrchestratorError> {
        let url = self.validate_url(url)?;
        let options = JobOptions {
            generate_visuals: options
                .generate_visuals
                .unwrap_or(self.inner.settings.generate_visuals),
        };

        let handle = self.inner.store.insert(Job::new(url.clone(), options));
        let id = handle.id().to_string();
        handle.apply(|_| {
            Ok(EventDraft::progress(Stage::Submission, "Analysis queued")
                .with_data(json!({ "url": url })))
        })?;
        self.inner.store.persist(&handle);

        let token = self.token_for(&id);
        let this = self.clone();
        let progress = self.progress(handle);
        let job_id = id.clone();
        tokio::spawn(async move {
            this.inner.pipeline.run(progress, token).await;
            this.release_token(&job_id);
        });

        log::info!("Started job {} for {}", id, url);
        Ok(id)
    }

    /// Fails a running job, discarding its room results. In-flight adapter
    /// calls are abandoned.
    pub fn cancel(&self, id: &str) -> Result<Job, OrchestratorError> {
        let handle = self.handle(id)?;
        handle.apply(|job| {
            if job.is_terminal() {
                return Err(StateError::JobTerminal { status: job.status });
            }
            let stage = Stage::for_status(job.status);
            job.discard_results(CANCELLED_REASON);
            job.fail(CANCELLED_REASON)?;
            Ok(EventDraft::terminal(stage, JobStatus::Failed, CANCELLED_REASON))
        })?;

        if let Some(token) = self.tokens().get(id) {
            token.cancel();
        }
        self.inner.store.persist(&handle);
        log::info!("Cancelled job {}", id);
        Ok(handle.snapshot())
    }

    /// Re-runs image generation for one room with a custom instruction.
    pub fn refine(&self, id: &str, room_index: usize, prompt: &str) -> Result<(), OrchestratorError> {
        self.refine_with(id, room_index, prompt, None)
    }

    /// [`refine`](Self::refine) with an architectural style that replaces
    /// the one detected from the room's analysis.
    pub fn refine_with(
        &self,
        id: &str,
        room_index: usize,
        prompt: &str,
        style: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "Refine prompt must not be empty".to_string(),
            ));
        }
        let style = style
            .map(str::parse::<ArchitecturalStyle>)
            .transpose()
            .map_err(OrchestratorError::InvalidInput)?;
        let handle = self.handle(id)?;

        handle.apply_with(|job| {
            let job_status = job.status;
            let room = job.room_mut(room_index)?;
            if room.stage_status.is_busy() {
                return Err(OrchestratorError::AlreadyInProgress(format!(
                    "Room {} is {}",
                    room_index, room.stage_status
                )));
            }
            if !matches!(job_status, JobStatus::Completed | JobStatus::Partial) {
                return Err(OrchestratorError::InvalidState(format!(
                    "Job is {}, refine needs a completed job",
                    job_status
                )));
            }
            if !room.stage_status.is_refinable() {
                return Err(OrchestratorError::InvalidState(format!(
                    "Room {} is {}, refine needs a generated image or a failed generation",
                    room_index, room.stage_status
                )));
            }
            room.transition(crate::model::RoomStageStatus::Refining)?;
            let mut data = json!({ "prompt": prompt });
            if let Some(style) = style {
                data["style"] = json!(style.to_string());
            }
            Ok(EventDraft::progress(Stage::Refine, format!("Refining {}", room.label))
                .with_room(room_index)
                .with_data(data))
        })?;
        self.inner.store.persist(&handle);

        let token = self.token_for(id).child_token();
        let this = self.clone();
        let progress = self.progress(handle);
        let job_id = id.to_string();
        tokio::spawn(async move {
            this.inner
                .pipeline
                .refine_room(progress, room_index, prompt, style, token)
                .await;
            this.release_token(&job_id);
        });

        log::info!("Refine started for job {} room {}", id, room_index);
        Ok(())
    }

    /// Replays every event so far, then follows the live tail.
    pub fn subscribe(&self, id: &str) -> Result<EventSubscription, OrchestratorError> {
        Ok(self.handle(id)?.subscribe())
    }

    pub fn snapshot(&self, id: &str) -> Result<Job, OrchestratorError> {
        Ok(self.handle(id)?.snapshot())
    }

    pub fn list_recent(&self, limit: usize) -> Vec<JobSummary> {
        self.inner.store.list_recent(limit)
    }

    /// Cancels the job if it is still running, then forgets it.
    pub fn delete(&self, id: &str) -> Result<(), OrchestratorError> {
        let handle = self.handle(id)?;
        if !handle.status().is_terminal() {
            match self.cancel(id) {
                Ok(_) | Err(OrchestratorError::InvalidState(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if let Some(token) = self.tokens().remove(id) {
            token.cancel();
        }
        self.inner.store.remove(id);
        log::info!("Deleted job {}", id);
        Ok(())
    }

    /// Abandons all in-flight work and closes the worker pool. Jobs left
    /// running are failed as interrupted on the next startup.
    pub fn shutdown(&self) {
        for token in self.tokens().values() {
            token.cancel();
        }
        self.pool().shutdown();
    }
}
