//! Orchestrator wired to scripted adapters, plus helpers for following a
//! job to its end.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use propertypulse::db::Database;
use propertypulse::model::Job;
use propertypulse::pipeline::{Backoff, Pipeline};
use propertypulse::{
    Adapters, Event, JobStore, Orchestrator, OrchestratorSettings, RetryPolicy, WorkerPool,
};

use super::fakes::{FakeAnalyzer, FakeExtractor, FakeVisualizer};

pub const LISTING_URL: &str = "https://www.rightmove.co.uk/properties/123";

const WAIT_LIMIT: Duration = Duration::from_secs(10);

/// Retries quickly so failure paths finish in a few milliseconds.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Backoff {
            initial: Duration::from_millis(1),
            multiplier: 2.0,
            max: Duration::from_millis(4),
        },
    }
}

pub struct TestHarness {
    pub orchestrator: Orchestrator,
    pub extractor: Arc<FakeExtractor>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub visualizer: Arc<FakeVisualizer>,
    pub store: Arc<JobStore>,
    /// Keeps the database file alive for persistence tests.
    temp_dir: Option<TempDir>,
}

pub struct HarnessBuilder {
    extractor: FakeExtractor,
    analyzer: FakeAnalyzer,
    visualizer: FakeVisualizer,
    concurrency: usize,
    retry: RetryPolicy,
    generate_visuals: bool,
    store: Option<Arc<JobStore>>,
    temp_dir: Option<TempDir>,
}

impl HarnessBuilder {
    pub fn new(extractor: FakeExtractor) -> Self {
        Self {
            extractor,
            analyzer: FakeAnalyzer::new(),
            visualizer: FakeVisualizer::new(),
            concurrency: 4,
            retry: fast_retry(3),
            generate_visuals: true,
            store: None,
            temp_dir: None,
        }
    }

    pub fn analyzer(mut self, analyzer: FakeAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn visualizer(mut self, visualizer: FakeVisualizer) -> Self {
        self.visualizer = visualizer;
        self
    }

    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn generate_visuals(mut self, enabled: bool) -> Self {
        self.generate_visuals = enabled;
        self
    }

    pub fn store(mut self, store: Arc<JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Backs the store with a SQLite file in a fresh temp directory.
    pub fn persistent(mut self) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("jobs.db")).expect("Failed to open database");
        self.store = Some(Arc::new(JobStore::with_database(db, 256)));
        self.temp_dir = Some(temp_dir);
        self
    }

    pub fn build(self) -> TestHarness {
        let extractor = Arc::new(self.extractor);
        let analyzer = Arc::new(self.analyzer);
        let visualizer = Arc::new(self.visualizer);
        let adapters = Adapters::new(extractor.clone(), analyzer.clone(), visualizer.clone());

        let settings = OrchestratorSettings {
            concurrency: self.concurrency,
            retry: self.retry,
            generate_visuals: self.generate_visuals,
            ..OrchestratorSettings::default()
        };
        let pool = Arc::new(WorkerPool::new(self.concurrency));
        let pipeline = Pipeline::new(pool, adapters, self.retry);
        let store = self.store.unwrap_or_default();
        let orchestrator = Orchestrator::with_pipeline(Arc::clone(&store), pipeline, settings);

        TestHarness {
            orchestrator,
            extractor,
            analyzer,
            visualizer,
            store,
            temp_dir: self.temp_dir,
        }
    }
}

impl TestHarness {
    pub fn builder(extractor: FakeExtractor) -> HarnessBuilder {
        HarnessBuilder::new(extractor)
    }

    pub fn db_path(&self) -> Option<std::path::PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join("jobs.db"))
    }

    pub fn start(&self) -> String {
        self.orchestrator
            .start(LISTING_URL)
            .expect("Failed to start job")
    }

    /// Collects the job's events until its stream ends.
    pub async fn run_to_end(&self, id: &str) -> Vec<Event> {
        collect_events(&self.orchestrator, id).await
    }

    /// Polls the job until `pred` holds.
    pub async fn wait_for<F>(&self, id: &str, pred: F) -> Job
    where
        F: Fn(&Job) -> bool,
    {
        wait_for(&self.orchestrator, id, pred).await
    }
}

pub async fn collect_events(orchestrator: &Orchestrator, id: &str) -> Vec<Event> {
    let mut subscription = orchestrator.subscribe(id).expect("Job should exist");
    let collect = async {
        let mut events = Vec::new();
        while let Some(event) = subscription.next().await {
            events.push(event);
        }
        events
    };
    tokio::time::timeout(WAIT_LIMIT, collect)
        .await
        .expect("Event stream did not end in time")
}

pub async fn wait_for<F>(orchestrator: &Orchestrator, id: &str, pred: F) -> Job
where
    F: Fn(&Job) -> bool,
{
    let poll = async {
        loop {
            let job = orchestrator.snapshot(id).expect("Job should exist");
            if pred(&job) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    };
    tokio::time::timeout(WAIT_LIMIT, poll)
        .await
        .expect("Condition not reached in time")
}

/// Sequence numbers must run 0..n with no gaps and exactly one terminal
/// event among the pipeline events.
pub fn assert_well_formed(events: &[Event]) {
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.seq, i as u64, "event seq gap at {}", i);
    }
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "expected exactly one terminal event");
}
