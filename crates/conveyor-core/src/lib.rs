//! conveyor-core
//!
//! A durable background job queue built on a polling record store.
//!
//! # Module map
//! - **job**: the `Job` contract and the name-to-type registry
//! - **queue**: the `QueueProvider` trait, queue records, and the bundled
//!   in-memory backend
//! - **worker**: bounded-batch execution with failure isolation
//! - **scheduler**: periodic-trigger adapter with overlap protection and
//!   self-rearming
//! - **dispatcher**: sync / queued / after-response dispatch decisions
//! - **manager**: named connections to providers
//! - **events**: typed lifecycle event bus
//! - **ports**: clock and ID-generation seams
//!
//! Delivery is at-least-once: an expired claim lock makes a record
//! reclaimable, so a worker that stalls past its lock can lead to duplicate
//! execution, never lost records.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod job;
pub mod manager;
pub mod ports;
pub mod queue;
pub mod scheduler;
pub mod worker;

pub use config::QueueConfig;
pub use dispatcher::{Dispatched, Dispatcher};
pub use error::{JobError, QueueError};
pub use events::{EventBus, EventKind, QueueEvent};
pub use job::{DEFAULT_QUEUE, Job, JobRegistry};
pub use manager::QueueManager;
pub use ports::{Clock, FixedClock, RecordId, SystemClock};
pub use queue::{
    ClaimedJob, JobStatus, MemoryProvider, PushJob, QueueCounts, QueueProvider, QueueRecord,
};
pub use scheduler::{Scheduler, SchedulerHandle, Tick};
pub use worker::{JobOutcome, JobReport, RunSummary, Worker};
