use std::sync::Arc;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::adapters::Adapters;
use crate::broadcast::Stage;
use crate::cost::{CostEngine, PropertyProfile, Region};
use crate::error::StateError;
use crate::model::{JobStatus, Photo, RoomAnalysis, RoomStageStatus, VisualizationEntry};

use super::pool::WorkerPool;
use super::progress::JobProgress;
use super::prompt::{image_prompt, renovation_prompt, styled_image_prompt, ArchitecturalStyle};
use super::retry::{CallError, RetryPolicy};

pub const NO_PHOTOS: &str = "Listing has no photos";
pub const NO_ANALYZED_ROOMS: &str = "No rooms could be analyzed";

/// Why a pipeline pass stopped early.
#[derive(Debug)]
enum Halt {
    /// The job went terminal underneath the pass (cancelled or deleted).
    Stopped,
    Failed { stage: Stage, reason: String },
}

impl Halt {
    fn failed(stage: Stage, reason: impl Into<String>) -> Self {
        Halt::Failed {
            stage,
            reason: reason.into(),
        }
    }
}

impl From<StateError> for Halt {
    fn from(err: StateError) -> Self {
        match err {
            StateError::JobTerminal { .. } => Halt::Stopped,
            other => Halt::failed(Stage::Finalize, other.to_string()),
        }
    }
}

/// Drives jobs through extraction, analysis, costing and visualization,
/// and runs per-room refines.
pub struct Pipeline {
    pool: Arc<WorkerPool>,
    adapters: Adapters,
    retry: RetryPolicy,
    costs: CostEngine,
}

impl Pipeline {
    pub fn new(pool: Arc<WorkerPool>, adapters: Adapters, retry: RetryPolicy) -> Self {
        Self {
            pool,
            adapters,
            retry,
            costs: CostEngine::default(),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Runs one full pass. Always leaves the job terminal unless `cancel`
    /// fired, in which case the canceller owns the terminal event.
    pub async fn run(&self, progress: JobProgress, cancel: CancellationToken) {
        let span = info_span!("pipeline", job_id = %progress.job_id());
        async {
            match self.run_stages(&progress, &cancel).await {
                Ok(status) => info!("Job finished with status {}", status),
                Err(Halt::Stopped) => debug!("Job stopped before finishing"),
                Err(Halt::Failed { stage, reason }) => {
                    warn!("Job failed during {}: {}", stage, reason);
                    if let Err(e) = progress.fail(stage, reason) {
                        debug!("Job already terminal, failure not recorded: {}", e);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        progress: &JobProgress,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, Halt> {
        self.extract(progress, cancel)
            .instrument(info_span!("extraction"))
            .await?;
        self.analyze(progress, cancel)
            .instrument(info_span!("analysis"))
            .await?;
        self.estimate(progress)?;
        self.visualize(progress, cancel)
            .instrument(info_span!("visualization"))
            .await?;
        Ok(progress.finalize()?)
    }

    // ─── Stages ─────────────────────────────────────────────────────────────

    async fn extract(&self, progress: &JobProgress, cancel: &CancellationToken) -> Result<(), Halt> {
        progress.advance(
            JobStatus::Extracting,
            Stage::Extraction,
            "Extracting listing details",
        )?;

        let url = progress.snapshot().url;
        let extractor = &self.adapters.extractor;
        let url_ref = url.as_str();
        let listing = match self
            .retry
            .call(&self.pool, cancel, "extract", move || extractor.extract(url_ref))
            .await
        {
            Ok(listing) => listing,
            Err(CallError::Cancelled) => return Err(Halt::Stopped),
            Err(CallError::Failed { error, attempts }) => {
                return Err(Halt::failed(
                    Stage::Extraction,
                    format!("Extraction failed after {} attempt(s): {}", attempts, error),
                ));
            }
        };

        let rooms = progress.listing_extracted(listing)?;
        if rooms == 0 {
            return Err(Halt::failed(Stage::Extraction, NO_PHOTOS));
        }
        Ok(())
    }

    async fn analyze(&self, progress: &JobProgress, cancel: &CancellationToken) -> Result<(), Halt> {
        let job = progress.snapshot();
        progress.advance(
            JobStatus::Analyzing,
            Stage::Analysis,
            format!("Analyzing {} room(s)", job.rooms.len()),
        )?;

        let floorplan = job.listing.as_ref().and_then(|l| l.floorplan.as_deref());
        let tasks = job
            .rooms
            .iter()
            .map(|room| self.analyze_room(progress, cancel, room.index, &room.photo));
        let (mut results, plan) = tokio::join!(
            join_all(tasks),
            self.analyze_floorplan(progress, cancel, floorplan)
        );
        results.push(plan);
        collect_halts(results)
    }

    /// A floor plan that cannot be read only costs the estimate its measured
    /// area.
    async fn analyze_floorplan(
        &self,
        progress: &JobProgress,
        cancel: &CancellationToken,
        reference: Option<&str>,
    ) -> Result<(), Halt> {
        let Some(reference) = reference else {
            return Ok(());
        };

        let analyzer = &self.adapters.analyzer;
        match self
            .retry
            .call(&self.pool, cancel, "analyze floorplan", move || {
                analyzer.analyze_floorplan(reference)
            })
            .await
        {
            Ok(plan) => progress.floorplan_analyzed(plan)?,
            Err(CallError::Cancelled) => return Err(Halt::Stopped),
            Err(CallError::Failed { error, attempts }) => {
                warn!("Floor plan analysis failed after {} attempt(s): {}", attempts, error);
                progress.note(
                    Stage::Analysis,
                    format!("Floor plan could not be read: {}", error),
                )?;
            }
        }
        Ok(())
    }

    async fn analyze_room(
        &self,
        progress: &JobProgress,
        cancel: &CancellationToken,
        index: usize,
        photo: &Photo,
    ) -> Result<(), Halt> {
        progress.room_started(index, RoomStageStatus::Analyzing, Stage::Analysis)?;

        let analyzer = &self.adapters.analyzer;
        let label = format!("analyze room {}", index);
        match self
            .retry
            .call(&self.pool, cancel, &label, move || analyzer.analyze(photo))
            .await
        {
            Ok(analysis) => progress.room_analyzed(index, analysis.normalized())?,
            Err(CallError::Cancelled) => return Err(Halt::Stopped),
            Err(CallError::Failed { error, attempts }) => {
                warn!("Room {} analysis failed after {} attempt(s): {}", index, attempts, error);
                progress.room_failed(
                    index,
                    Stage::Analysis,
                    RoomStageStatus::AnalysisFailed,
                    error.to_string(),
                )?;
            }
        }
        Ok(())
    }

    fn estimate(&self, progress: &JobProgress) -> Result<(), Halt> {
        let _span = info_span!("costing").entered();
        progress.advance(
            JobStatus::Costing,
            Stage::Costing,
            "Estimating renovation costs",
        )?;

        let job = progress.snapshot();
        let analyzed = job.analyzed_rooms();
        if analyzed.is_empty() {
            return Err(Halt::failed(Stage::Costing, NO_ANALYZED_ROOMS));
        }

        let (region, profile) = match &job.listing {
            Some(listing) => (
                Region::detect(&listing.address),
                PropertyProfile::from_listing(listing).with_floorplan(job.floorplan.as_ref()),
            ),
            None => (Region::default(), PropertyProfile::default()),
        };
        let indices: Vec<usize> = analyzed.iter().map(|(index, _)| *index).collect();
        let analyses: Vec<RoomAnalysis> = analyzed.iter().map(|(_, a)| (*a).clone()).collect();

        let estimate = self
            .costs
            .estimate_with_profile(&analyses, region, &profile);
        debug!(
            "Estimated {} rooms in {} at mid {}",
            analyses.len(),
            region,
            estimate.grand_total.mid
        );
        progress.costs_ready(&indices, estimate)?;
        Ok(())
    }

    async fn visualize(&self, progress: &JobProgress, cancel: &CancellationToken) -> Result<(), Halt> {
        let job = progress.snapshot();
        let targets: Vec<(usize, &Photo, &RoomAnalysis)> = job
            .rooms
            .iter()
            .filter(|r| r.stage_status == RoomStageStatus::Analyzed)
            .filter_map(|r| r.analysis.as_ref().map(|a| (r.index, &r.photo, a)))
            .collect();

        progress.advance(
            JobStatus::Visualizing,
            Stage::Visualization,
            format!("Generating renovation images for {} room(s)", targets.len()),
        )?;

        if !job.options.generate_visuals {
            progress.note(Stage::Visualization, "Image generation skipped for this job")?;
            return Ok(());
        }

        let tasks = targets
            .into_iter()
            .map(|(index, photo, analysis)| self.visualize_room(progress, cancel, index, photo, analysis));
        collect_halts(join_all(tasks).await)
    }

    async fn visualize_room(
        &self,
        progress: &JobProgress,
        cancel: &CancellationToken,
        index: usize,
        photo: &Photo,
        analysis: &RoomAnalysis,
    ) -> Result<(), Halt> {
        progress.room_started(index, RoomStageStatus::Generating, Stage::Visualization)?;

        let brief = renovation_prompt(analysis);
        let full_prompt = image_prompt(analysis, &brief);
        let visualizer = &self.adapters.visualizer;
        let prompt_ref = full_prompt.as_str();
        let label = format!("generate room {}", index);

        match self
            .retry
            .call(&self.pool, cancel, &label, move || {
                visualizer.generate(photo, prompt_ref)
            })
            .await
        {
            Ok(image) => progress.room_generated(index, VisualizationEntry::new(brief, image))?,
            Err(CallError::Cancelled) => return Err(Halt::Stopped),
            Err(CallError::Failed { error, attempts }) => {
                warn!("Room {} generation failed after {} attempt(s): {}", index, attempts, error);
                progress.room_failed(
                    index,
                    Stage::Visualization,
                    RoomStageStatus::GenerationFailed,
                    error.to_string(),
                )?;
            }
        }
        Ok(())
    }

    // ─── Refine ─────────────────────────────────────────────────────────────

    /// Regenerates one room's image with a caller-supplied instruction. The
    /// room must already be REFINING.
    pub async fn refine_room(
        &self,
        progress: JobProgress,
        index: usize,
        prompt: String,
        style: Option<ArchitecturalStyle>,
        cancel: CancellationToken,
    ) {
        let span = info_span!("refine", job_id = %progress.job_id(), room = index);
        async {
            let job = progress.snapshot();
            let Some(room) = job.rooms.get(index) else {
                return;
            };
            let full_prompt = match (&room.analysis, style) {
                (Some(analysis), Some(style)) => styled_image_prompt(analysis, &prompt, style),
                (Some(analysis), None) => image_prompt(analysis, &prompt),
                (None, _) => prompt.clone(),
            };
            let visualizer = &self.adapters.visualizer;
            let photo = &room.photo;
            let prompt_ref = full_prompt.as_str();

            let outcome = match self
                .retry
                .call(&self.pool, &cancel, "refine", move || {
                    visualizer.generate(photo, prompt_ref)
                })
                .await
            {
                Ok(image) => Ok(VisualizationEntry::new(prompt, image)),
                Err(CallError::Cancelled) => Err("Refine cancelled".to_string()),
                Err(CallError::Failed { error, attempts }) => {
                    warn!("Refine failed after {} attempt(s): {}", attempts, error);
                    Err(error.to_string())
                }
            };

            if let Err(e) = progress.refine_finished(index, outcome) {
                warn!("Could not record refine result: {}", e);
            }
        }
        .instrument(span)
        .await
    }
}

/// A stopped job wins over a failure, which wins over success.
fn collect_halts(results: Vec<Result<(), Halt>>) -> Result<(), Halt> {
    let mut first_failure = None;
    for result in results {
        match result {
            Ok(()) => {}
            Err(Halt::Stopped) => return Err(Halt::Stopped),
            Err(failure) => {
                first_failure.get_or_insert(failure);
            }
        }
    }
    first_failure.map_or(Ok(()), Err)
}
