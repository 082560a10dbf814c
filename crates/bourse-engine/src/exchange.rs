//! The [`Exchange`] facade.
//!
//! Owns the injected collaborators (store, clock, event sink) and the
//! validated configuration. Business operations live in the sibling
//! modules as `impl Exchange` blocks; each one is a single call to
//! [`Exchange::run`] or a sequence of them.

use std::sync::Arc;

use bourse_ledger::OrderValidator;
use bourse_store::{Committed, MemoryStore, Tx};
use bourse_types::{Clock, EngineConfig, Result, SystemClock};
use chrono::{DateTime, Utc};

use crate::events::{EventSink, NoopSink};

/// Entry point for every business action and query.
pub struct Exchange {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) config: EngineConfig,
    pub(crate) validator: OrderValidator,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Exchange {
    /// Build an exchange over an existing store.
    ///
    /// # Errors
    /// `Configuration` if `config` is inconsistent.
    pub fn new(
        config: EngineConfig,
        store: Arc<MemoryStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let validator = OrderValidator::new(&config);
        Ok(Self {
            store,
            clock,
            sink,
            config,
            validator,
        })
    }

    /// A fresh in-memory exchange on the system clock with no listeners.
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::new(config.retry.clone()));
        Self::new(config, store, Arc::new(SystemClock), Arc::new(NoopSink))
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run one business action in a retried transaction and publish its
    /// events once it has committed.
    pub(crate) fn run<T, F>(&self, label: &str, body: F) -> Result<T>
    where
        F: FnMut(&mut Tx<'_>) -> Result<T>,
    {
        let Committed { value, events } = self.store.transaction(label, body)?;
        for event in events {
            self.sink.emit(event);
        }
        Ok(value)
    }
}
