//! Job registry: maps persisted job names back to runnable types.
//!
//! A typed job is erased into an [`ErasedJob`] so all registered types fit
//! one map; the erased runner re-establishes the concrete type by
//! deserializing the payload.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use super::Job;
use crate::error::{JobError, QueueError};

/// Object-safe face of a registered job type.
#[async_trait]
pub trait ErasedJob: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deserialize `payload` into the concrete job type and run it.
    async fn run_payload(&self, payload: serde_json::Value) -> Result<(), JobError>;
}

struct TypedRunner<J: Job> {
    _marker: PhantomData<fn() -> J>,
}

#[async_trait]
impl<J: Job> ErasedJob for TypedRunner<J> {
    fn name(&self) -> &'static str {
        J::NAME
    }

    async fn run_payload(&self, payload: serde_json::Value) -> Result<(), JobError> {
        let job: J = serde_json::from_value(payload)
            .map_err(|e| JobError::new(format!("payload decode for '{}': {e}", J::NAME)))?;
        job.run().await
    }
}

/// Registry of job types known to this application.
///
/// Built once at startup (mutable), then shared read-only with workers.
#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, Arc<dyn ErasedJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self { jobs: HashMap::new() }
    }

    /// Register a job type. Re-registering the same name is an error.
    pub fn register<J: Job>(&mut self) -> Result<(), QueueError> {
        if self.jobs.contains_key(J::NAME) {
            return Err(QueueError::DuplicateJob(J::NAME.to_string()));
        }
        self.jobs
            .insert(J::NAME, Arc::new(TypedRunner::<J> { _marker: PhantomData }));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ErasedJob>> {
        self.jobs.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.jobs.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Greet {
        name: String,
    }

    #[async_trait]
    impl Job for Greet {
        const NAME: &'static str = "test.greet";

        async fn run(self) -> Result<(), JobError> {
            if self.name.is_empty() {
                return Err(JobError::new("empty name"));
            }
            Ok(())
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Count {
        up_to: u32,
    }

    #[async_trait]
    impl Job for Count {
        const NAME: &'static str = "test.count";

        async fn run(self) -> Result<(), JobError> {
            Ok(())
        }
    }

    #[test]
    fn register_then_get() {
        let mut registry = JobRegistry::new();
        registry.register::<Greet>().unwrap();

        assert!(registry.get(Greet::NAME).is_some());
        assert!(registry.get("test.unknown").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = JobRegistry::new();
        registry.register::<Greet>().unwrap();

        let err = registry.register::<Greet>().unwrap_err();
        assert!(matches!(err, QueueError::DuplicateJob(name) if name == "test.greet"));
    }

    #[test]
    fn distinct_types_coexist() {
        let mut registry = JobRegistry::new();
        registry.register::<Greet>().unwrap();
        registry.register::<Count>().unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get(Greet::NAME).is_some());
        assert!(registry.get(Count::NAME).is_some());
    }

    #[tokio::test]
    async fn erased_runner_round_trips_the_payload() {
        let mut registry = JobRegistry::new();
        registry.register::<Greet>().unwrap();

        let runner = registry.get(Greet::NAME).unwrap();
        runner
            .run_payload(serde_json::json!({ "name": "world" }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn undecodable_payload_fails_with_context() {
        let mut registry = JobRegistry::new();
        registry.register::<Greet>().unwrap();

        let runner = registry.get(Greet::NAME).unwrap();
        let err = runner
            .run_payload(serde_json::json!({ "wrong": true }))
            .await
            .unwrap_err();
        assert!(err.message().contains("test.greet"));
    }
}
