//! Scripted adapters with call counting, concurrency tracking and gates.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use propertypulse::adapters::{AnalysisError, ExtractionError, GenerationError};
use propertypulse::model::{
    FloorplanAnalysis, GeneratedImage, Photo, Priority, PropertyListing, RenovationItem,
    RoomAnalysis, WorkScope,
};
use propertypulse::{Analyzer, Extractor, Visualizer};

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Tracks how many calls are running at once across all fakes sharing it.
#[derive(Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

pub struct ProbeGuard<'a> {
    probe: &'a ConcurrencyProbe,
}

impl ConcurrencyProbe {
    pub fn enter(&self) -> ProbeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard { probe: self }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.probe.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Blocks calls until released. Starts open unless created closed.
#[derive(Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn open() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn closed() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn release(&self) {
        self.tx.send_replace(true);
    }

    pub fn close(&self) {
        self.tx.send_replace(false);
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Per-label failure script: the queued errors are returned first, then
/// the permanent error if any, then success.
struct Script<E> {
    queued: HashMap<String, VecDeque<E>>,
    always: HashMap<String, E>,
    calls: HashMap<String, usize>,
}

impl<E: Clone> Script<E> {
    fn new() -> Self {
        Self {
            queued: HashMap::new(),
            always: HashMap::new(),
            calls: HashMap::new(),
        }
    }

    fn next_failure(&mut self, label: &str) -> Option<E> {
        *self.calls.entry(label.to_string()).or_default() += 1;
        if let Some(err) = self.queued.get_mut(label).and_then(|q| q.pop_front()) {
            return Some(err);
        }
        self.always.get(label).cloned()
    }
}

pub fn photo_labels(labels: &[&str]) -> Vec<Photo> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| Photo::new(*label, format!("https://media.test/{}.jpg", i)))
        .collect()
}

pub fn listing(labels: &[&str]) -> PropertyListing {
    let mut listing = PropertyListing::new(
        "https://www.rightmove.co.uk/properties/123",
        "14 Chapel Street, Leeds, LS6 2AB",
    )
    .with_photos(photo_labels(labels));
    listing.bedrooms = 3;
    listing.bathrooms = 1;
    listing.price_text = "£250,000".to_string();
    listing
}

/// Script key for floor plan calls on [`FakeAnalyzer`].
pub const FLOORPLAN: &str = "floorplan";

/// A listing with a floor plan and a stated size of 1,000 sqft.
pub fn listing_with_floorplan(labels: &[&str]) -> PropertyListing {
    let mut listing = listing(labels);
    listing.sqft = Some(1_000);
    listing.floorplan = Some("https://media.test/floorplan.png".to_string());
    listing
}

// ─── Extractor ──────────────────────────────────────────────────────────────

pub struct FakeExtractor {
    outcome: Mutex<Result<PropertyListing, ExtractionError>>,
    failures: Mutex<VecDeque<ExtractionError>>,
    calls: AtomicUsize,
    pub gate: Gate,
}

impl FakeExtractor {
    pub fn returning(listing: PropertyListing) -> Self {
        Self {
            outcome: Mutex::new(Ok(listing)),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            gate: Gate::open(),
        }
    }

    pub fn failing(error: ExtractionError) -> Self {
        let fake = Self::returning(PropertyListing::new("", ""));
        *fake.outcome.lock().unwrap() = Err(error);
        fake
    }

    pub fn fail_first(self, errors: Vec<ExtractionError>) -> Self {
        *self.failures.lock().unwrap() = errors.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, _url: &str) -> Result<PropertyListing, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.wait().await;
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.outcome.lock().unwrap().clone()
    }
}

// ─── Analyzer ───────────────────────────────────────────────────────────────

pub struct FakeAnalyzer {
    script: Mutex<Script<AnalysisError>>,
    pub probe: Arc<ConcurrencyProbe>,
    pub gate: Gate,
    delay: Duration,
    floorplan_sqm: f64,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::new()),
            probe: Arc::new(ConcurrencyProbe::default()),
            gate: Gate::open(),
            delay: Duration::ZERO,
            floorplan_sqm: 130.0,
        }
    }

    pub fn with_floorplan_sqm(mut self, sqm: f64) -> Self {
        self.floorplan_sqm = sqm;
        self
    }

    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn always_fail(self, label: &str, error: AnalysisError) -> Self {
        self.script
            .lock()
            .unwrap()
            .always
            .insert(label.to_string(), error);
        self
    }

    pub fn fail_times(self, label: &str, errors: Vec<AnalysisError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .insert(label.to_string(), errors.into());
        self
    }

    pub fn calls_for(&self, label: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .get(label)
            .copied()
            .unwrap_or(0)
    }

    /// Analysis returned for a label: a mid-condition room needing paint.
    pub fn analysis_for(label: &str) -> RoomAnalysis {
        RoomAnalysis::new(label, 5)
            .with_issue("scuffed paintwork")
            .with_item(RenovationItem::new(
                "Paint walls and ceiling",
                Priority::Recommended,
                WorkScope::Repair,
            ))
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(&self, photo: &Photo) -> Result<RoomAnalysis, AnalysisError> {
        let _running = self.probe.enter();
        self.gate.wait().await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failure = self.script.lock().unwrap().next_failure(&photo.label);
        match failure {
            Some(err) => Err(err),
            None => Ok(Self::analysis_for(&photo.label)),
        }
    }

    async fn analyze_floorplan(&self, _reference: &str) -> Result<FloorplanAnalysis, AnalysisError> {
        let _running = self.probe.enter();
        let failure = self.script.lock().unwrap().next_failure(FLOORPLAN);
        match failure {
            Some(err) => Err(err),
            None => Ok(FloorplanAnalysis::new(self.floorplan_sqm)),
        }
    }
}

// ─── Visualizer ─────────────────────────────────────────────────────────────

pub struct FakeVisualizer {
    script: Mutex<Script<GenerationError>>,
    prompts: Mutex<Vec<(String, String)>>,
    pub probe: Arc<ConcurrencyProbe>,
    pub gate: Gate,
    delay: Duration,
}

impl FakeVisualizer {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::new()),
            prompts: Mutex::new(Vec::new()),
            probe: Arc::new(ConcurrencyProbe::default()),
            gate: Gate::open(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn always_fail(self, label: &str, error: GenerationError) -> Self {
        self.script
            .lock()
            .unwrap()
            .always
            .insert(label.to_string(), error);
        self
    }

    /// Makes every later call for `label` fail.
    pub fn break_label(&self, label: &str, error: GenerationError) {
        self.script
            .lock()
            .unwrap()
            .always
            .insert(label.to_string(), error);
    }

    /// Removes a permanent failure so later calls succeed.
    pub fn heal(&self, label: &str) {
        self.script.lock().unwrap().always.remove(label);
    }

    pub fn calls_for(&self, label: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .get(label)
            .copied()
            .unwrap_or(0)
    }

    /// Every (photo label, prompt) pair received, in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Visualizer for FakeVisualizer {
    async fn generate(&self, photo: &Photo, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let _running = self.probe.enter();
        self.prompts
            .lock()
            .unwrap()
            .push((photo.label.clone(), prompt.to_string()));
        self.gate.wait().await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failure = self.script.lock().unwrap().next_failure(&photo.label);
        let calls = self.calls_for(&photo.label);
        match failure {
            Some(err) => Err(err),
            None => Ok(GeneratedImage::new(format!(
                "render://{}/{}",
                photo.label, calls
            ))),
        }
    }
}
