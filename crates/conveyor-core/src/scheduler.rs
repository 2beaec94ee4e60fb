//! Scheduler: bridges a periodic trigger to the worker.
//!
//! The core only reacts to [`Scheduler::tick`]; what fires it (a cron
//! daemon, a timer task, a test) stays outside. If the trigger never fires,
//! queued records sit durably in the provider until it resumes; that is
//! the accepted trade-off of a polling backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::QueueError;
use crate::queue::QueueProvider;
use crate::worker::{RunSummary, Worker};

/// Outcome of one trigger firing.
#[derive(Debug)]
pub enum Tick {
    /// Another run was already in flight; nothing happened.
    Skipped,

    /// A worker run finished. `rearm` asks the trigger for an immediate
    /// follow-up because the run claimed work and more is still pending.
    Ran { summary: RunSummary, rearm: bool },
}

pub struct Scheduler {
    worker: Arc<Worker>,
    provider: Arc<dyn QueueProvider>,
    queue: Option<String>,
    batch_size: usize,

    /// Overlap lock: coarser than the per-record claim locks, it only stops
    /// this process from stacking redundant runs.
    in_flight: AtomicBool,
}

impl Scheduler {
    pub fn new(
        worker: Arc<Worker>,
        provider: Arc<dyn QueueProvider>,
        queue: Option<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            worker,
            provider,
            queue,
            batch_size,
            in_flight: AtomicBool::new(false),
        }
    }

    /// React to one trigger firing.
    pub async fn tick(&self) -> Result<Tick, QueueError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!(queue = self.queue.as_deref().unwrap_or("*"), "tick skipped, run in flight");
            return Ok(Tick::Skipped);
        }
        let result = self.run_once().await;
        self.in_flight.store(false, Ordering::Release);
        result
    }

    async fn run_once(&self) -> Result<Tick, QueueError> {
        let queue = self.queue.as_deref();
        let summary = self.worker.run(queue, self.batch_size).await?;
        // Re-arm only when this run claimed something: pending records that
        // are merely delayed must wait out the base interval, not spin the
        // trigger.
        let rearm =
            summary.processed() > 0 && self.provider.pending_count(queue).await? > 0;
        Ok(Tick::Ran { summary, rearm })
    }

    /// Drive ticks from a timer task: the built-in trigger for deployments
    /// without an external cron. Re-ticks immediately while a backlog
    /// remains, otherwise waits out the base interval.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                match self.tick().await {
                    Ok(Tick::Ran { rearm: true, .. }) => continue,
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "scheduled run failed"),
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => continue,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        SchedulerHandle { shutdown_tx, join }
    }
}

/// Handle on the built-in timer trigger.
///
/// Shutdown stops taking new ticks; it does not cancel an in-flight run.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}
