//! Progress tracking for import jobs.
//!
//! Every job owns a [`ProgressTracker`]. Mutations are reflected in a shared
//! [`ProgressData`] snapshot (pull) and broadcast on a [`ProgressBus`] (push).

use std::sync::Arc;

use flowport_types::{ProgressData, ProgressKind};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

/// A progress snapshot published for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub progress: ProgressData,
}

/// Broadcast channel carrying progress events of every job.
///
/// Subscribers only see events emitted after they subscribed. A subscriber
/// that falls more than `capacity` events behind receives
/// [`broadcast::error::RecvError::Lagged`].
#[derive(Debug, Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Returns the number of subscribers that received it;
    /// having none is not an error.
    pub fn emit(&self, event: ProgressEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Completed/total counter pair of a single job.
///
/// Cloning yields another handle to the same counters.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    job_id: Uuid,
    data: Arc<Mutex<ProgressData>>,
    bus: ProgressBus,
}

impl ProgressTracker {
    pub fn new(job_id: Uuid, bus: ProgressBus) -> Self {
        Self {
            job_id,
            data: Arc::new(Mutex::new(ProgressData::new())),
            bus,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Grow the number of expected units. Totals never shrink.
    pub fn add_total(&self, units: u64) {
        if units == 0 {
            return;
        }
        let mut data = self.data.lock();
        if !data.finished {
            data.events_total = data.events_total.saturating_add(units);
        }
    }

    /// Record one completed unit.
    pub fn step(&self) {
        self.update(|data| {
            data.events_count = data.events_count.saturating_add(1);
        });
    }

    /// Mark the job as failed. Only the first terminal call has any effect.
    pub fn cancel(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(move |data| {
            data.events_count = data.events_total;
            data.finished = true;
            data.kind = ProgressKind::Danger;
            data.text = message;
        });
    }

    /// Mark the job as successfully finished. Only the first terminal call
    /// has any effect.
    pub fn finish(&self) {
        self.update(|data| data.finished = true);
    }

    pub fn snapshot(&self) -> ProgressData {
        self.data.lock().clone()
    }

    fn update(&self, mutate: impl FnOnce(&mut ProgressData)) {
        let progress = {
            let mut data = self.data.lock();
            if data.finished {
                return;
            }
            mutate(&mut data);
            data.clone()
        };
        self.bus.emit(ProgressEvent {
            job_id: self.job_id,
            progress,
        });
    }
}
