//! Queue worker: claims a bounded batch and executes it with failure
//! isolation.

use std::sync::Arc;

use crate::error::QueueError;
use crate::events::{EventBus, QueueEvent};
use crate::job::JobRegistry;
use crate::ports::RecordId;
use crate::queue::{ClaimedJob, QueueProvider};

/// How one claimed job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
}

/// Per-job entry in a run summary.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub id: RecordId,
    pub job: String,
    pub outcome: JobOutcome,
}

/// Result of one worker run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<JobReport>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.reports.len()
    }

    pub fn completed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == JobOutcome::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.processed() - self.completed()
    }
}

/// Executes claimed jobs strictly sequentially.
///
/// Concurrency across runs is the scheduler's overlap lock plus the
/// provider's atomic claim; within one run there is none. A job failure is
/// contained: the record goes to Failed, `JobFailed` is emitted, and the
/// batch moves on. Only a failed claim propagates out of [`Worker::run`].
pub struct Worker {
    provider: Arc<dyn QueueProvider>,
    registry: Arc<JobRegistry>,
    events: EventBus,
}

impl Worker {
    pub fn new(provider: Arc<dyn QueueProvider>, registry: Arc<JobRegistry>, events: EventBus) -> Self {
        Self {
            provider,
            registry,
            events,
        }
    }

    /// One pass: claim up to `batch_size` jobs on `queue` and run them.
    pub async fn run(&self, queue: Option<&str>, batch_size: usize) -> Result<RunSummary, QueueError> {
        self.events.emit(&QueueEvent::RunStart {
            queue: queue.map(str::to_string),
        });

        let claimed = self.provider.pop(queue, batch_size).await?;
        tracing::debug!(queue = queue.unwrap_or("*"), claimed = claimed.len(), "worker run");

        let mut summary = RunSummary::default();
        for job in claimed {
            let report = self.process(job).await;
            summary.reports.push(report);
        }

        self.events.emit(&QueueEvent::RunComplete {
            queue: queue.map(str::to_string),
            reports: summary.reports.clone(),
        });
        Ok(summary)
    }

    /// Execute one claimed job and settle its record. A provider error on
    /// the settle is logged and the batch moves on; the record stays Running
    /// until its lock expires and stale-lock recovery re-claims it.
    async fn process(&self, claimed: ClaimedJob) -> JobReport {
        self.events.emit(&QueueEvent::JobProcessing {
            id: claimed.id,
            job: claimed.job.clone(),
        });

        let outcome = self.execute(&claimed).await;
        match &outcome {
            JobOutcome::Completed => {
                if let Err(e) = self.provider.complete(claimed.id).await {
                    tracing::error!(job = %claimed.job, id = %claimed.id, error = %e, "could not mark record completed");
                }
                self.events.emit(&QueueEvent::JobProcessed {
                    id: claimed.id,
                    job: claimed.job.clone(),
                });
            }
            JobOutcome::Failed(error) => {
                tracing::warn!(job = %claimed.job, id = %claimed.id, error = %error, "job failed");
                if let Err(e) = self.provider.fail(claimed.id, error.clone()).await {
                    tracing::error!(job = %claimed.job, id = %claimed.id, error = %e, "could not mark record failed");
                }
                self.events.emit(&QueueEvent::JobFailed {
                    id: claimed.id,
                    job: claimed.job.clone(),
                    error: error.clone(),
                });
            }
        }

        JobReport {
            id: claimed.id,
            job: claimed.job,
            outcome,
        }
    }

    /// Failure boundary around one job. Runs the payload on a spawned task
    /// so a panicking job is captured like any other failure instead of
    /// unwinding through the batch.
    async fn execute(&self, claimed: &ClaimedJob) -> JobOutcome {
        let Some(runner) = self.registry.get(&claimed.job) else {
            return JobOutcome::Failed(format!("no job registered for '{}'", claimed.job));
        };

        let payload = claimed.payload.clone();
        let handle = tokio::spawn(async move { runner.run_payload(payload).await });
        match handle.await {
            Ok(Ok(())) => JobOutcome::Completed,
            Ok(Err(e)) => JobOutcome::Failed(e.message().to_string()),
            Err(join) => JobOutcome::Failed(format!("job panicked: {join}")),
        }
    }
}
