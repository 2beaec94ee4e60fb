//! Dispatcher: the call-site API deciding how a job runs.
//!
//! Three paths:
//! - queued (`dispatch` on a job with `QUEUEABLE = true`): serialized and
//!   persisted through a provider, the only path with a delivery
//!   guarantee;
//! - inline (`dispatch` on a plain job, or `dispatch_now`): runs on the
//!   caller's task, errors return to the caller;
//! - after-response (`dispatch_after_response`): held on a terminating list
//!   and run exactly once when [`Dispatcher::terminate`] fires. Strictly
//!   best-effort: a killed process loses these.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::error::{JobError, QueueError};
use crate::events::{EventBus, QueueEvent};
use crate::job::Job;
use crate::manager::QueueManager;
use crate::ports::RecordId;
use crate::queue::PushJob;

/// How a dispatch resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A record was persisted; nothing executed yet.
    Queued(RecordId),

    /// The job ran inline and finished.
    Ran,
}

type AfterResponse = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send + 'static>>;

struct Deferred {
    name: &'static str,
    run: AfterResponse,
}

pub struct Dispatcher {
    manager: Arc<QueueManager>,
    events: EventBus,
    after_response: Mutex<Vec<Deferred>>,
}

impl Dispatcher {
    pub fn new(manager: Arc<QueueManager>, events: EventBus) -> Self {
        Self {
            manager,
            events,
            after_response: Mutex::new(Vec::new()),
        }
    }

    /// Dispatch a job the way its type asks for: queueable jobs go to their
    /// provider, everything else runs inline here and now.
    pub async fn dispatch<J: Job>(&self, job: J) -> Result<Dispatched, QueueError> {
        if J::QUEUEABLE {
            let id = self.push(job).await?;
            Ok(Dispatched::Queued(id))
        } else {
            job.run().await?;
            Ok(Dispatched::Ran)
        }
    }

    /// Run inline regardless of the job's capability.
    pub async fn dispatch_now<J: Job>(&self, job: J) -> Result<(), QueueError> {
        job.run().await?;
        Ok(())
    }

    /// Dispatch only when `condition` holds; otherwise nothing happens at
    /// all: no record, no event.
    pub async fn dispatch_if<J: Job>(
        &self,
        condition: bool,
        job: J,
    ) -> Result<Option<Dispatched>, QueueError> {
        if !condition {
            return Ok(None);
        }
        self.dispatch(job).await.map(Some)
    }

    pub async fn dispatch_unless<J: Job>(
        &self,
        condition: bool,
        job: J,
    ) -> Result<Option<Dispatched>, QueueError> {
        self.dispatch_if(!condition, job).await
    }

    /// Defer a job until the current request/response cycle finishes.
    ///
    /// The job runs exactly once when `terminate` is called, not before.
    /// Nothing is persisted: callers needing delivery guarantees should use
    /// `dispatch` on a queueable job instead.
    pub fn dispatch_after_response<J: Job>(&self, job: J) {
        let mut deferred = self.after_response.lock().expect("dispatcher lock poisoned");
        deferred.push(Deferred {
            name: J::NAME,
            run: job.run(),
        });
    }

    /// Run the terminating list, draining it. Failures are logged and
    /// swallowed; this path is best-effort by contract.
    pub async fn terminate(&self) -> usize {
        let deferred: Vec<Deferred> = {
            let mut list = self.after_response.lock().expect("dispatcher lock poisoned");
            list.drain(..).collect()
        };

        let count = deferred.len();
        for job in deferred {
            if let Err(e) = job.run.await {
                tracing::warn!(job = job.name, error = %e, "after-response job failed");
            }
        }
        count
    }

    /// Is an identical job already waiting or running on its queue?
    pub async fn is_queued<J: Job>(&self, job: &J) -> Result<bool, QueueError> {
        let payload = serde_json::to_value(job)?;
        let provider = self.manager.get_provider(job.connection())?;
        provider.in_queue(J::NAME, &payload, Some(job.queue())).await
    }

    async fn push<J: Job>(&self, job: J) -> Result<RecordId, QueueError> {
        // Serialize first: a job that cannot be made durable fails here,
        // before any record exists.
        let payload = serde_json::to_value(&job)?;
        let provider = self.manager.get_provider(job.connection())?;

        let queue = job.queue().to_string();
        let id = provider
            .push(PushJob {
                job: J::NAME.to_string(),
                payload,
                queue: queue.clone(),
                delay: job.delay(),
            })
            .await?;

        self.events.emit(&QueueEvent::JobQueued {
            id,
            job: J::NAME.to_string(),
            queue,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::events::EventKind;
    use crate::queue::{MemoryProvider, QueueProvider};

    static INLINE_RUNS: AtomicUsize = AtomicUsize::new(0);
    static QUEUED_RUNS: AtomicUsize = AtomicUsize::new(0);
    static DEFERRED_RUNS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Serialize, Deserialize)]
    struct InlineJob;

    #[async_trait]
    impl Job for InlineJob {
        const NAME: &'static str = "test.inline";

        async fn run(self) -> Result<(), JobError> {
            INLINE_RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct QueuedJob {
        n: u64,
    }

    #[async_trait]
    impl Job for QueuedJob {
        const NAME: &'static str = "test.queued";
        const QUEUEABLE: bool = true;

        async fn run(self) -> Result<(), JobError> {
            QUEUED_RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct DeferredJob;

    #[async_trait]
    impl Job for DeferredJob {
        const NAME: &'static str = "test.deferred";

        async fn run(self) -> Result<(), JobError> {
            DEFERRED_RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// A job holding something that refuses to serialize, standing in for a
    /// captured live resource.
    #[derive(Debug, Deserialize)]
    struct ResourceJob;

    impl Serialize for ResourceJob {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("live resource cannot be serialized"))
        }
    }

    #[async_trait]
    impl Job for ResourceJob {
        const NAME: &'static str = "test.resource";
        const QUEUEABLE: bool = true;

        async fn run(self) -> Result<(), JobError> {
            Ok(())
        }
    }

    fn setup() -> (Arc<MemoryProvider>, Dispatcher, EventBus) {
        let provider = Arc::new(MemoryProvider::new());
        let manager = Arc::new(QueueManager::new("memory"));
        manager.add_provider("memory", provider.clone());
        let events = EventBus::new();
        let dispatcher = Dispatcher::new(manager, events.clone());
        (provider, dispatcher, events)
    }

    #[tokio::test]
    async fn plain_job_runs_inline_with_no_record() {
        let (provider, dispatcher, _) = setup();
        let before = INLINE_RUNS.load(Ordering::SeqCst);

        let resolved = dispatcher.dispatch(InlineJob).await.unwrap();

        assert_eq!(resolved, Dispatched::Ran);
        assert_eq!(INLINE_RUNS.load(Ordering::SeqCst), before + 1);
        assert_eq!(provider.counts(None).await.unwrap(), Default::default());
    }

    #[tokio::test]
    async fn queueable_job_persists_exactly_one_record_without_running() {
        let (provider, dispatcher, _) = setup();
        let before = QUEUED_RUNS.load(Ordering::SeqCst);

        let resolved = dispatcher.dispatch(QueuedJob { n: 7 }).await.unwrap();

        let Dispatched::Queued(id) = resolved else {
            panic!("expected a queued dispatch");
        };
        assert_eq!(QUEUED_RUNS.load(Ordering::SeqCst), before);
        assert_eq!(provider.pending_count(None).await.unwrap(), 1);

        let record = provider.record(id).await.unwrap().unwrap();
        assert_eq!(record.job, QueuedJob::NAME);
        assert_eq!(record.payload, serde_json::json!({ "n": 7 }));
    }

    #[tokio::test]
    async fn queued_dispatch_emits_job_queued() {
        let (_, dispatcher, events) = setup();

        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        events.listen(EventKind::JobQueued, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch(QueuedJob { n: 1 }).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatch_now_runs_even_queueable_jobs_inline() {
        let (provider, dispatcher, _) = setup();
        let before = QUEUED_RUNS.load(Ordering::SeqCst);

        dispatcher.dispatch_now(QueuedJob { n: 1 }).await.unwrap();

        assert_eq!(QUEUED_RUNS.load(Ordering::SeqCst), before + 1);
        assert_eq!(provider.pending_count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dispatch_if_false_has_no_effect_at_all() {
        let (provider, dispatcher, events) = setup();

        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        events.listen_all(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let resolved = dispatcher.dispatch_if(false, QueuedJob { n: 1 }).await.unwrap();

        assert!(resolved.is_none());
        assert_eq!(provider.counts(None).await.unwrap(), Default::default());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dispatch_unless_inverts_the_condition() {
        let (provider, dispatcher, _) = setup();

        assert!(dispatcher.dispatch_unless(true, QueuedJob { n: 1 }).await.unwrap().is_none());
        assert!(dispatcher.dispatch_unless(false, QueuedJob { n: 2 }).await.unwrap().is_some());
        assert_eq!(provider.pending_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn after_response_runs_exactly_once_at_terminate() {
        let (provider, dispatcher, _) = setup();
        let before = DEFERRED_RUNS.load(Ordering::SeqCst);

        dispatcher.dispatch_after_response(DeferredJob);

        // Not executed before the terminating phase, and nothing persisted.
        assert_eq!(DEFERRED_RUNS.load(Ordering::SeqCst), before);
        assert_eq!(provider.counts(None).await.unwrap(), Default::default());

        assert_eq!(dispatcher.terminate().await, 1);
        assert_eq!(DEFERRED_RUNS.load(Ordering::SeqCst), before + 1);

        // The list drained: a second terminate runs nothing.
        assert_eq!(dispatcher.terminate().await, 0);
        assert_eq!(DEFERRED_RUNS.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn serialization_failure_surfaces_and_persists_nothing() {
        let (provider, dispatcher, _) = setup();

        let err = dispatcher.dispatch(ResourceJob).await.unwrap_err();

        assert!(matches!(err, QueueError::Serialization(_)));
        assert_eq!(provider.counts(None).await.unwrap(), Default::default());
    }

    #[tokio::test]
    async fn unknown_connection_surfaces_before_anything_persists() {
        let provider = Arc::new(MemoryProvider::new());
        let manager = Arc::new(QueueManager::new("redis"));
        manager.add_provider("memory", provider.clone());
        let dispatcher = Dispatcher::new(manager, EventBus::new());

        let err = dispatcher.dispatch(QueuedJob { n: 1 }).await.unwrap_err();
        assert!(matches!(err, QueueError::UnknownConnection(_)));
        assert_eq!(provider.pending_count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn is_queued_finds_identical_payloads() {
        let (_, dispatcher, _) = setup();

        dispatcher.dispatch(QueuedJob { n: 42 }).await.unwrap();

        assert!(dispatcher.is_queued(&QueuedJob { n: 42 }).await.unwrap());
        assert!(!dispatcher.is_queued(&QueuedJob { n: 43 }).await.unwrap());
    }
}
