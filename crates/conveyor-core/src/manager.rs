//! Queue manager: named connections to providers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::QueueError;
use crate::queue::QueueProvider;

type ProviderFactory = Box<dyn Fn() -> Arc<dyn QueueProvider> + Send + Sync>;

enum Entry {
    Ready(Arc<dyn QueueProvider>),
    Deferred(ProviderFactory),
}

/// Registry mapping connection names to providers.
///
/// Populated at bootstrap, read-only afterwards during normal operation
/// (tests swap in fakes through `add_provider`). Deferred entries are
/// instantiated on first resolution and cached.
pub struct QueueManager {
    default_connection: String,
    entries: Mutex<HashMap<String, Entry>>,
}

impl QueueManager {
    pub fn new(default_connection: impl Into<String>) -> Self {
        Self {
            default_connection: default_connection.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_connection(&self) -> &str {
        &self.default_connection
    }

    pub fn add_provider(&self, name: impl Into<String>, provider: Arc<dyn QueueProvider>) {
        let mut entries = self.entries.lock().expect("manager lock poisoned");
        entries.insert(name.into(), Entry::Ready(provider));
    }

    /// Register a connection that is only built if something asks for it.
    pub fn add_deferred<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn QueueProvider> + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock().expect("manager lock poisoned");
        entries.insert(name.into(), Entry::Deferred(Box::new(factory)));
    }

    /// Resolve `name`, or the default connection when `None`.
    pub fn get_provider(&self, name: Option<&str>) -> Result<Arc<dyn QueueProvider>, QueueError> {
        let name = name.unwrap_or(&self.default_connection);
        let mut entries = self.entries.lock().expect("manager lock poisoned");

        let Some(entry) = entries.get_mut(name) else {
            return Err(QueueError::UnknownConnection(name.to_string()));
        };
        let provider = match entry {
            Entry::Ready(provider) => provider.clone(),
            Entry::Deferred(factory) => {
                let provider = factory();
                *entry = Entry::Ready(provider.clone());
                provider
            }
        };
        Ok(provider)
    }
}
