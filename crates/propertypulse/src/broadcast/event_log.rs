//! Append-only per-job event log with a live broadcast tail.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};

use super::event::{Event, EventDraft};
use super::job_store::JobHandle;

/// The ordered events of one job.
///
/// Not synchronized on its own: it lives inside the job's slot and is only
/// touched while the job lock is held, which is what keeps `seq` assignment
/// and snapshot mutation atomic.
pub struct EventLog {
    events: Vec<Event>,
    sender: broadcast::Sender<Event>,
}

impl EventLog {
    /// Creates an empty log whose live channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self::from_events(Vec::new(), capacity)
    }

    /// Rebuilds a log from persisted events.
    pub fn from_events(events: Vec<Event>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { events, sender }
    }

    /// Assigns the next sequence number, stores the event and publishes it.
    pub fn append(&mut self, draft: EventDraft) -> Event {
        let event = draft.into_event(self.events.len() as u64);
        self.events.push(event.clone());
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event.clone());
        event
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events with `seq >= from`.
    pub fn since(&self, from: u64) -> Vec<Event> {
        let start = (from as usize).min(self.events.len());
        self.events[start..].to_vec()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Snapshot of the log plus a receiver positioned right after it.
    pub(crate) fn open(&self) -> (Vec<Event>, broadcast::Receiver<Event>) {
        (self.events.clone(), self.sender.subscribe())
    }
}

/// One observer's view of a job's events: replay first, then the live tail.
///
/// Delivers every event exactly once in `seq` order. If the receiver falls
/// behind the broadcast buffer the missed range is read back from the log.
/// Ends once the job is terminal, nothing is in flight and every logged
/// event has been delivered.
pub struct EventSubscription {
    handle: Arc<JobHandle>,
    pending: VecDeque<Event>,
    receiver: broadcast::Receiver<Event>,
    next_seq: u64,
    finished: bool,
}

impl EventSubscription {
    pub(crate) fn new(
        handle: Arc<JobHandle>,
        replay: Vec<Event>,
        receiver: broadcast::Receiver<Event>,
        settled: bool,
    ) -> Self {
        let finished = replay.is_empty() && settled;
        Self {
            handle,
            pending: replay.into(),
            receiver,
            next_seq: 0,
            finished,
        }
    }

    pub fn job_id(&self) -> &str {
        self.handle.id()
    }

    /// Next event, or `None` when the stream has ended.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(event) = self.pending.pop_front() {
                if event.seq < self.next_seq {
                    continue;
                }
                return Some(self.deliver(event));
            }

            match self.receiver.recv().await {
                Ok(event) if event.seq < self.next_seq => continue,
                Ok(event) if event.seq == self.next_seq => return Some(self.deliver(event)),
                Ok(_) => self.refill(),
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!(
                        "Subscriber for job {} lagged by {} events, recovering from log",
                        self.handle.id(),
                        skipped
                    );
                    self.refill();
                }
                Err(RecvError::Closed) => {
                    self.refill();
                    if self.pending.is_empty() {
                        self.finished = true;
                    }
                }
            }
        }
    }

    /// Converts the subscription into a `Stream` of events.
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        stream::unfold(self, |mut sub| async move {
            let event = sub.next().await?;
            Some((event, sub))
        })
    }

    fn deliver(&mut self, event: Event) -> Event {
        self.next_seq = event.seq + 1;
        if self.pending.is_empty() && self.handle.is_settled_at(self.next_seq) {
            self.finished = true;
        }
        event
    }

    fn refill(&mut self) {
        self.pending = self.handle.events_since(self.next_seq).into();
    }
}
