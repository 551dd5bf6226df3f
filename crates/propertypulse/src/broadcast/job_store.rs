//! Job store with optional database write-through.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;

use super::event::{Event, EventDraft, Stage};
use super::event_log::{EventLog, EventSubscription};
use crate::config::Config;
use crate::db::job_repo::{self, JobRow};
use crate::db::{default_database_path, Database, DatabaseError};
use crate::error::StateError;
use crate::model::{Job, JobStatus, JobSummary, RoomStageStatus};

const INTERRUPTED_REASON: &str = "Interrupted by restart";

// ─── JobHandle ──────────────────────────────────────────────────────────────

struct JobSlot {
    job: Job,
    log: EventLog,
}

/// Shared handle to one job: its materialized state and its event log,
/// guarded by a single lock.
pub struct JobHandle {
    id: String,
    slot: Mutex<JobSlot>,
}

impl JobHandle {
    fn new(job: Job, log: EventLog) -> Self {
        Self {
            id: job.id.clone(),
            slot: Mutex::new(JobSlot { job, log }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, JobSlot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job {} lock was poisoned, recovering", self.id);
                poisoned.into_inner()
            }
        }
    }

    pub fn snapshot(&self) -> Job {
        self.lock().job.clone()
    }

    pub fn status(&self) -> JobStatus {
        self.lock().job.status
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().log.events().to_vec()
    }

    pub fn is_settled(&self) -> bool {
        self.lock().job.is_settled()
    }

    pub fn events_since(&self, seq: u64) -> Vec<Event> {
        self.lock().log.since(seq)
    }

    pub fn event_count(&self) -> usize {
        self.lock().log.len()
    }

    /// True when the job is terminal, no room has work in flight and the log
    /// holds exactly `next_seq` events.
    pub(crate) fn is_settled_at(&self, next_seq: u64) -> bool {
        let slot = self.lock();
        slot.job.is_settled() && slot.log.len() as u64 == next_seq
    }

    /// Opens a subscription that replays the whole log and then follows the
    /// live tail. Replay and receiver are taken under the same lock, so no
    /// event can fall between them.
    pub fn subscribe(self: &Arc<Self>) -> EventSubscription {
        let (replay, receiver, settled) = {
            let slot = self.lock();
            let (replay, receiver) = slot.log.open();
            let settled = slot.job.is_settled();
            (replay, receiver, settled)
        };
        EventSubscription::new(Arc::clone(self), replay, receiver, settled)
    }

    /// Mutates the job and appends the event returned by `f` as one atomic
    /// step. `f` works on a copy: when it returns an error nothing changes
    /// and no event is emitted.
    pub fn apply<F>(&self, f: F) -> Result<Event, StateError>
    where
        F: FnOnce(&mut Job) -> Result<EventDraft, StateError>,
    {
        self.apply_with(f)
    }

    /// [`apply`](Self::apply) with a caller-chosen error type, for checks
    /// that must reject with something other than a state error.
    ///
    /// Refine commits only write their own room, so they leave `updated_at`
    /// alone.
    pub fn apply_with<F, E>(&self, f: F) -> Result<Event, E>
    where
        F: FnOnce(&mut Job) -> Result<EventDraft, E>,
    {
        let mut slot = self.lock();
        let mut next = slot.job.clone();
        let draft = f(&mut next)?;
        if draft.stage != Stage::Refine {
            next.updated_at = Utc::now();
        }
        slot.job = next;
        Ok(slot.log.append(draft))
    }

    /// Like [`apply`](Self::apply), but refuses to touch a terminal job.
    /// Used by the pipeline pass so late writes after a cancel are dropped.
    pub fn apply_active<F>(&self, f: F) -> Result<Event, StateError>
    where
        F: FnOnce(&mut Job) -> Result<EventDraft, StateError>,
    {
        self.apply(|job| {
            if job.is_terminal() {
                return Err(StateError::JobTerminal { status: job.status });
            }
            f(job)
        })
    }

    fn parts(&self) -> (Job, Vec<Event>) {
        let slot = self.lock();
        (slot.job.clone(), slot.log.events().to_vec())
    }
}

// ─── JobStore ───────────────────────────────────────────────────────────────

/// In-memory registry of all jobs, the single owner of job state.
pub struct JobStore {
    jobs: RwLock<HashMap<String, Arc<JobHandle>>>,
    db: RwLock<Option<Database>>,
    event_capacity: usize,
}

impl JobStore {
    /// Creates an in-memory store. Each job's live channel buffers
    /// `event_capacity` events.
    pub fn new(event_capacity: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            db: RwLock::new(None),
            event_capacity,
        }
    }

    pub fn with_database(db: Database, event_capacity: usize) -> Self {
        let store = Self::new(event_capacity);
        store.set_database(db);
        store
    }

    /// Builds the store described by `config.storage` and loads whatever
    /// a previous process left in the database.
    pub fn open(config: &Config) -> crate::Result<Self> {
        let capacity = config.events.channel_capacity;
        if config.storage.in_memory {
            log::info!("Job storage is in memory only");
            return Ok(Self::new(capacity));
        }

        let path = config
            .storage
            .database_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(default_database_path);
        let Some(path) = path else {
            log::warn!("No home directory for the job database, keeping jobs in memory");
            return Ok(Self::new(capacity));
        };

        let store = Self::with_database(Database::open(&path)?, capacity);
        let loaded = store.load_from_database()?;
        log::info!("Loaded {} jobs from {}", loaded, path.display());
        Ok(store)
    }

    pub fn set_database(&self, db: Database) {
        match self.db.write() {
            Ok(mut guard) => *guard = Some(db),
            Err(poisoned) => {
                log::warn!("JobStore database lock was poisoned, recovering");
                *poisoned.into_inner() = Some(db);
            }
        }
    }

    fn database(&self) -> Option<Database> {
        match self.db.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                log::warn!("JobStore database lock was poisoned, recovering");
                poisoned.into_inner().clone()
            }
        }
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<JobHandle>>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("JobStore lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<JobHandle>>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("JobStore lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Registers a new job with an empty event log.
    pub fn insert(&self, job: Job) -> Arc<JobHandle> {
        let handle = Arc::new(JobHandle::new(job, EventLog::new(self.event_capacity)));
        self.write_jobs()
            .insert(handle.id().to_string(), Arc::clone(&handle));
        handle
    }

    pub fn get(&self, id: &str) -> Option<Arc<JobHandle>> {
        self.read_jobs().get(id).cloned()
    }

    pub fn snapshot(&self, id: &str) -> Option<Job> {
        self.get(id).map(|h| h.snapshot())
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_jobs().is_empty()
    }

    /// Newest jobs first.
    pub fn list_recent(&self, limit: usize) -> Vec<JobSummary> {
        let handles: Vec<Arc<JobHandle>> = self.read_jobs().values().cloned().collect();
        let mut summaries: Vec<JobSummary> =
            handles.iter().map(|h| h.snapshot().summary()).collect();
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        summaries.truncate(limit);
        summaries
    }

    /// Removes a job from memory and from the database.
    pub fn remove(&self, id: &str) -> Option<Arc<JobHandle>> {
        let removed = self.write_jobs().remove(id);
        if let Some(db) = self.database() {
            if let Err(e) = job_repo::delete(&db, id) {
                log::error!("Failed to delete job {} from database: {}", id, e);
            }
        }
        removed
    }

    /// Writes the job's current snapshot and event log to the database.
    /// Failures are logged; they never affect the job itself. Jobs that are
    /// no longer registered are skipped so a late write cannot revive a
    /// deleted row.
    pub fn persist(&self, handle: &JobHandle) {
        let Some(db) = self.database() else {
            return;
        };
        // Held until the write lands; `remove` waits for it.
        let jobs = self.read_jobs();
        if !jobs.contains_key(handle.id()) {
            return;
        }
        let (job, events) = handle.parts();
        let row = match to_row(&job, &events) {
            Ok(row) => row,
            Err(e) => {
                log::error!("Failed to serialize job {}: {}", job.id, e);
                return;
            }
        };
        if let Err(e) = job_repo::upsert(&db, &row) {
            log::error!("Failed to persist job {}: {}", job.id, e);
        }
    }

    /// Loads persisted jobs into memory. Jobs that were still running when
    /// the previous process stopped are failed with a terminal event, and
    /// interrupted refines are marked failed.
    pub fn load_from_database(&self) -> Result<usize, DatabaseError> {
        let Some(db) = self.database() else {
            return Ok(0);
        };

        let rows = job_repo::load_all(&db)?;
        let mut loaded = 0;

        for row in rows {
            let (job, events) = match from_row(&row) {
                Ok(parts) => parts,
                Err(e) => {
                    log::warn!("Skipping unreadable job {} in database: {}", row.id, e);
                    continue;
                }
            };

            let handle = Arc::new(JobHandle::new(
                job,
                EventLog::from_events(events, self.event_capacity),
            ));

            self.write_jobs()
                .insert(handle.id().to_string(), Arc::clone(&handle));
            if recover_interrupted(&handle) {
                self.persist(&handle);
            }
            loaded += 1;
        }

        log::info!("Loaded {} jobs from database", loaded);
        Ok(loaded)
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(256)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Returns true when the job had to be changed.
fn recover_interrupted(handle: &JobHandle) -> bool {
    let snapshot = handle.snapshot();
    let mut changed = false;

    if snapshot.is_terminal() {
        for room in snapshot.rooms.iter().filter(|r| r.stage_status.is_busy()) {
            let index = room.index;
            let result = handle.apply(|job| {
                let room = job.room_mut(index)?;
                room.transition(RoomStageStatus::GenerationFailed)?;
                room.error = Some(INTERRUPTED_REASON.to_string());
                Ok(EventDraft::error(Stage::Refine, INTERRUPTED_REASON).with_room(index))
            });
            changed |= result.is_ok();
        }
        return changed;
    }

    let result = handle.apply(|job| {
        job.settle_busy_rooms(INTERRUPTED_REASON);
        job.fail(INTERRUPTED_REASON)?;
        Ok(EventDraft::terminal(
            Stage::Finalize,
            JobStatus::Failed,
            INTERRUPTED_REASON,
        ))
    });
    if result.is_ok() {
        log::warn!("Job {} was interrupted by a restart, marked failed", handle.id());
    }
    result.is_ok()
}

fn to_row(job: &Job, events: &[Event]) -> Result<JobRow, serde_json::Error> {
    Ok(JobRow {
        id: job.id.clone(),
        url: job.url.clone(),
        status: job.status.as_str().to_string(),
        address: job.listing.as_ref().map(|l| l.address.clone()),
        price_text: job
            .listing
            .as_ref()
            .map(|l| l.price_text.clone())
            .filter(|p| !p.is_empty()),
        snapshot: serde_json::to_string(job)?,
        events: serde_json::to_string(events)?,
        event_count: events.len() as i64,
        created_at: job.created_at.to_rfc3339(),
        updated_at: job.updated_at.to_rfc3339(),
    })
}

fn from_row(row: &JobRow) -> Result<(Job, Vec<Event>), serde_json::Error> {
    let job: Job = serde_json::from_str(&row.snapshot)?;
    let events: Vec<Event> = serde_json::from_str(&row.events)?;
    Ok((job, events))
}
