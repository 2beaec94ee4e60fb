//! Queue lifecycle events.
//!
//! A small typed pub/sub bus scoped to the application instance. Every
//! dispatch resolution and every worker transition is observable here, which
//! is also how tests assert on queue behavior without poking at provider
//! internals.

use std::sync::{Arc, Mutex};

use crate::ports::RecordId;
use crate::worker::JobReport;

#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A worker run began on `queue` (`None` means all queues).
    RunStart { queue: Option<String> },

    /// A worker run finished; `reports` carries one entry per claimed job.
    RunComplete {
        queue: Option<String>,
        reports: Vec<JobReport>,
    },

    /// A record was persisted by an async dispatch.
    JobQueued {
        id: RecordId,
        job: String,
        queue: String,
    },

    /// A claimed job is about to execute.
    JobProcessing { id: RecordId, job: String },

    /// A job finished cleanly; its record is Completed.
    JobProcessed { id: RecordId, job: String },

    /// A job raised an error; its record is Failed.
    JobFailed {
        id: RecordId,
        job: String,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStart,
    RunComplete,
    JobQueued,
    JobProcessing,
    JobProcessed,
    JobFailed,
}

impl QueueEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            QueueEvent::RunStart { .. } => EventKind::RunStart,
            QueueEvent::RunComplete { .. } => EventKind::RunComplete,
            QueueEvent::JobQueued { .. } => EventKind::JobQueued,
            QueueEvent::JobProcessing { .. } => EventKind::JobProcessing,
            QueueEvent::JobProcessed { .. } => EventKind::JobProcessed,
            QueueEvent::JobFailed { .. } => EventKind::JobFailed,
        }
    }
}

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

/// Callback-registry event bus.
///
/// Cloning shares the listener table. Listeners run synchronously on the
/// emitting task, in registration order.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<(Option<EventKind>, Listener)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for one event kind.
    pub fn listen<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock().expect("event bus lock poisoned");
        listeners.push((Some(kind), Arc::new(handler)));
    }

    /// Listen for every event.
    pub fn listen_all<F>(&self, handler: F)
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock().expect("event bus lock poisoned");
        listeners.push((None, Arc::new(handler)));
    }

    pub fn emit(&self, event: &QueueEvent) {
        // Snapshot under the lock, call outside it: a handler may register
        // further listeners.
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.lock().expect("event bus lock poisoned");
            listeners
                .iter()
                .filter(|(kind, _)| kind.is_none() || *kind == Some(event.kind()))
                .map(|(_, l)| Arc::clone(l))
                .collect()
        };
        for listener in snapshot {
            listener(event);
        }
    }
}
