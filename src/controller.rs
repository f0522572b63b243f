//! Per-consumer query controllers.
//!
//! A [`QueryController`] owns a set of inputs (an id typed by the user, a
//! "fetch" flag, a hovered row) and derives from them the [`Query`] to run
//! and whether it is enabled. Every input change goes through
//! [`QueryController::update`], which recomputes both synchronously and, when
//! the outcome calls for it, asks the cache to fetch:
//!
//! - enabled goes from false to true: fetch the current key
//! - the key changes while enabled: release the old key, fetch the new one
//! - enabled goes from true to false: release the key
//!
//! Releasing a key supersedes its in-flight fetch if nobody else observes it.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut lookup = QueryController::builder(cache.clone(), 1_u32, |id: &u32| {
//!     Query::new(QueryKey::new("todo").with(*id), fetch_todo(*id))
//! })
//! .enabled_when("id in range", |id| (1..=200).contains(id))
//! .build();
//!
//! lookup.update(|id| *id = 42); // fetches ["todo", 42]
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::QueryError;
use crate::key::QueryKey;
use crate::polling::PollingTimer;
use crate::query::{
    FetchOptions, FetchOutcome, Interest, Query, QueryCache, QueryEntry, QueryStatus,
    Subscription,
};

type BuildFn<I> = Box<dyn Fn(&I) -> Query + Send + Sync>;

struct Gate<I> {
    name: &'static str,
    check: Box<dyn Fn(&I) -> bool + Send + Sync>,
}

/// Builder for [`QueryController`].
pub struct QueryControllerBuilder<I> {
    cache: QueryCache,
    inputs: I,
    build: BuildFn<I>,
    gates: Vec<Gate<I>>,
}

impl<I> QueryControllerBuilder<I> {
    /// Adds a predicate that must hold for the query to be enabled.
    ///
    /// `name` identifies the predicate in [`QueryController::blocked_by`].
    #[must_use]
    pub fn enabled_when<P>(mut self, name: &'static str, predicate: P) -> Self
    where
        P: Fn(&I) -> bool + Send + Sync + 'static,
    {
        self.gates.push(Gate {
            name,
            check: Box::new(predicate),
        });
        self
    }

    /// Creates the controller, fetching right away if it is enabled.
    pub fn build(self) -> QueryController<I> {
        let query = (self.build)(&self.inputs);
        let mut controller = QueryController {
            cache: self.cache,
            inputs: self.inputs,
            build: self.build,
            gates: self.gates,
            query,
            enabled: false,
            interest: None,
        };
        controller.reconcile();
        controller
    }
}

/// The view of one query for one consumer.
///
/// Read accessors are projections of the cache entry for the current key;
/// the controller stores no query state of its own. Dropping the controller
/// releases its interest in the key.
pub struct QueryController<I> {
    cache: QueryCache,
    inputs: I,
    build: BuildFn<I>,
    gates: Vec<Gate<I>>,
    query: Query,
    enabled: bool,
    interest: Option<Interest>,
}

impl<I> QueryController<I> {
    /// Starts building a controller over `inputs`.
    ///
    /// `build` maps the inputs to the query to run. It is called again after
    /// every input change.
    pub fn builder<F>(cache: QueryCache, inputs: I, build: F) -> QueryControllerBuilder<I>
    where
        F: Fn(&I) -> Query + Send + Sync + 'static,
    {
        QueryControllerBuilder {
            cache,
            inputs,
            build: Box::new(build),
            gates: Vec::new(),
        }
    }

    /// Changes the inputs and reacts to the result.
    pub fn update(&mut self, f: impl FnOnce(&mut I)) {
        f(&mut self.inputs);
        self.reconcile();
    }

    /// Replaces the inputs and reacts to the result.
    pub fn set_inputs(&mut self, inputs: I) {
        self.update(|current| *current = inputs);
    }

    pub const fn inputs(&self) -> &I {
        &self.inputs
    }

    pub const fn query(&self) -> &Query {
        &self.query
    }

    pub const fn key(&self) -> &QueryKey {
        self.query.key()
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Name of the first predicate that currently fails, if any.
    pub fn blocked_by(&self) -> Option<&'static str> {
        self.gates
            .iter()
            .find(|gate| !(gate.check)(&self.inputs))
            .map(|gate| gate.name)
    }

    /// Fetches the current key regardless of staleness. No-op when disabled.
    pub fn refetch(&self) -> FetchOutcome {
        self.cache
            .fetch(&self.query, FetchOptions::new().enabled(self.enabled))
    }

    /// A polling timer for the current query.
    ///
    /// The timer keeps polling this key even if the controller's key changes
    /// later.
    pub fn polling_timer(&self) -> PollingTimer {
        PollingTimer::new(self.cache.clone(), self.query.clone())
    }

    /// Subscribes to the entry of the current key.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&QueryEntry) + Send + Sync + 'static,
    {
        self.cache.subscribe(self.key(), callback)
    }

    /// Snapshot of the entry for the current key. Does not create one.
    pub fn entry(&self) -> QueryEntry {
        self.cache
            .entry(self.key())
            .unwrap_or_else(|| QueryEntry::new(self.cache.config().stale_time))
    }

    pub fn status(&self) -> QueryStatus {
        self.entry().status()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == QueryStatus::Pending
    }

    pub fn is_fetching(&self) -> bool {
        self.status() == QueryStatus::Fetching
    }

    pub fn is_success(&self) -> bool {
        self.status() == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status() == QueryStatus::Error
    }

    pub fn data(&self) -> Option<Arc<Value>> {
        self.entry().shared_data()
    }

    /// Decodes the current data into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Decode`] if the data does not match `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, QueryError> {
        self.entry().data_as()
    }

    pub fn error(&self) -> Option<QueryError> {
        self.entry().error().cloned()
    }

    fn reconcile(&mut self) {
        let next = (self.build)(&self.inputs);
        let enabled = self.gates.iter().all(|gate| (gate.check)(&self.inputs));
        let key_changed = next.key() != self.query.key();
        let was_enabled = self.enabled;

        self.query = next;
        self.enabled = enabled;

        match (was_enabled, enabled) {
            (false, true) => self.activate(),
            (true, true) if key_changed => self.activate(),
            (true, false) => {
                debug!(key = %self.query.key(), blocked_by = ?self.blocked_by(), "query disabled");
                self.interest = None;
            }
            _ => {}
        }
    }

    fn activate(&mut self) {
        // Release the previous key before observing the new one.
        self.interest = None;
        self.interest = Some(self.cache.observe(self.query.key()));
        debug!(key = %self.query.key(), "query enabled");
        self.cache
            .fetch(&self.query, FetchOptions::new().only_if_stale(true));
    }
}

impl QueryController<()> {
    /// A controller for a fixed query with no inputs, enabled immediately.
    pub fn fixed(cache: QueryCache, query: Query) -> Self {
        Self::builder(cache, (), move |_| query.clone()).build()
    }
}

impl<I: fmt::Debug> fmt::Debug for QueryController<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryController")
            .field("inputs", &self.inputs)
            .field("key", self.key())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
