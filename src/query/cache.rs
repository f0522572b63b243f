use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::FutureExt;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::QueryConfig;
use super::entry::{InFlight, QueryEntry};
use super::{FetchOptions, FetchOutcome, Query};
use crate::error::QueryError;
use crate::fetcher::QueryFn;
use crate::key::QueryKey;

type Callback = Arc<dyn Fn(&QueryEntry) + Send + Sync>;

struct Slot {
    entry: QueryEntry,
    subscribers: Vec<(u64, Callback)>,
    interest: usize,
}

impl Slot {
    const fn new(config: &QueryConfig) -> Self {
        Self {
            entry: QueryEntry::new(config.stale_time),
            subscribers: Vec::new(),
            interest: 0,
        }
    }
}

/// The keyed store of query state.
///
/// The `QueryCache` is the only owner of query entries. It handles:
/// - Running fetches and collapsing concurrent fetches of one key
/// - Discarding results of superseded fetches
/// - Notifying subscribers after every entry mutation
///
/// Clones share the same entries.
///
/// # Example
///
/// ```rust
/// use todo_query::query::{QueryCache, QueryConfig};
/// use std::time::Duration;
///
/// let cache = QueryCache::with_config(QueryConfig::new(Duration::from_secs(5)));
/// assert!(cache.is_empty());
/// ```
#[derive(Clone)]
pub struct QueryCache {
    slots: Arc<DashMap<QueryKey, Slot>>,
    config: QueryConfig,
    ids: Arc<AtomicU64>,
}

impl QueryCache {
    /// Creates a new query cache with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query cache with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            config,
            ids: Arc::new(AtomicU64::new(1)),
        }
    }

    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Number of keys with an entry.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the entry for `key`, creating an idle one if needed.
    pub fn get_or_create(&self, key: &QueryKey) -> QueryEntry {
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(&self.config))
            .entry
            .clone()
    }

    /// Returns the entry for `key` without creating it.
    pub fn entry(&self, key: &QueryKey) -> Option<QueryEntry> {
        self.slots.get(key).map(|slot| slot.entry.clone())
    }

    /// Checks whether `key` needs a refetch.
    ///
    /// True if no fetch for `key` has ever succeeded, if the key was
    /// invalidated, or if the last success is older than its stale time.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.slots
            .get(key)
            .is_none_or(|slot| slot.entry.is_stale_at(Instant::now()))
    }

    /// Fetches `query`, unless a fetch for its key is already in flight.
    ///
    /// A fetch that starts moves the entry to `pending` (no prior state) or
    /// `fetching`, notifies subscribers, and runs the query function on a
    /// spawned task. Completion applies the result and notifies again.
    /// Failures are stored in the entry, never returned.
    ///
    /// Must be called from within a tokio runtime.
    pub fn fetch(&self, query: &Query, options: FetchOptions) -> FetchOutcome {
        if !options.enabled {
            return FetchOutcome::Disabled;
        }

        let key = query.key();
        let (snapshot, in_flight) = {
            let mut slot = self
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(&self.config));

            if let Some(stale_time) = query.stale_time() {
                slot.entry.stale_after = stale_time;
            }

            if let Some(in_flight) = &slot.entry.in_flight {
                debug!(key = %key, generation = in_flight.generation, "joining in-flight fetch");
                return FetchOutcome::Joined(in_flight.clone());
            }

            if options.only_if_stale && !slot.entry.is_stale_at(Instant::now()) {
                return FetchOutcome::Fresh;
            }

            let generation = self.next_id();
            let in_flight = InFlight {
                generation,
                previous: slot.entry.status,
                observed: slot.interest > 0,
                done: run_fetch(self.clone(), key.clone(), generation, query.fetcher())
                    .boxed()
                    .shared(),
            };
            slot.entry.begin(in_flight.clone());
            debug!(key = %key, generation, status = ?slot.entry.status, "fetch started");

            (slot.entry.clone(), in_flight)
        };

        self.notify(key, &snapshot);
        tokio::spawn(in_flight.done.clone());

        FetchOutcome::Started(in_flight)
    }

    /// Registers `callback` to run after every mutation of `key`'s entry.
    ///
    /// Callbacks run synchronously, in subscription order, with no lock
    /// held, so they may call back into the cache.
    pub fn subscribe<F>(&self, key: &QueryKey, callback: F) -> Subscription
    where
        F: Fn(&QueryEntry) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(&self.config))
            .subscribers
            .push((id, Arc::new(callback)));

        Subscription {
            cache: self.clone(),
            key: key.clone(),
            id,
        }
    }

    /// Registers active interest in `key`.
    ///
    /// While any interest in a key is alive, its in-flight fetch is applied
    /// when it completes. When the last interest is dropped mid-flight, a
    /// fetch that started while the key was observed is superseded: the
    /// entry returns to the status it had before the fetch and the late
    /// result is discarded. Fetches started with no interest held, such as
    /// poll ticks, always complete.
    pub fn observe(&self, key: &QueryKey) -> Interest {
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(&self.config))
            .interest += 1;

        Interest {
            cache: self.clone(),
            key: key.clone(),
        }
    }

    /// Marks `key` stale without fetching it.
    pub fn invalidate(&self, key: &QueryKey) {
        let snapshot = {
            let Some(mut slot) = self.slots.get_mut(key) else {
                return;
            };
            slot.entry.invalidated = true;
            slot.entry.clone()
        };
        debug!(key = %key, "invalidated");
        self.notify(key, &snapshot);
    }

    fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::Relaxed)
    }

    fn settle(&self, key: &QueryKey, generation: u64, result: Result<Value, QueryError>) {
        let snapshot = {
            let Some(mut slot) = self.slots.get_mut(key) else {
                return;
            };

            let current = slot.entry.in_flight.as_ref().map(InFlight::generation);
            if current != Some(generation) {
                debug!(key = %key, generation, ?current, "discarding superseded result");
                return;
            }

            match result {
                Ok(value) => slot.entry.succeed(value, Instant::now()),
                Err(err) => {
                    warn!(key = %key, generation, error = %err, "fetch failed");
                    slot.entry.fail(err);
                }
            }
            slot.entry.clone()
        };

        debug!(key = %key, generation, status = ?snapshot.status, "fetch settled");
        self.notify(key, &snapshot);
    }

    fn release(&self, key: &QueryKey) {
        let snapshot = {
            let Some(mut slot) = self.slots.get_mut(key) else {
                return;
            };

            slot.interest = slot.interest.saturating_sub(1);
            if slot.interest > 0 {
                return;
            }

            let Some(abandoned) = slot.entry.abandon() else {
                return;
            };
            debug!(key = %key, generation = abandoned.generation, "superseded in-flight fetch");
            slot.entry.clone()
        };

        self.notify(key, &snapshot);
    }

    fn unsubscribe(&self, key: &QueryKey, id: u64) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.subscribers.retain(|(subscriber, _)| *subscriber != id);
        }
    }

    fn notify(&self, key: &QueryKey, entry: &QueryEntry) {
        // Snapshot the list so callbacks can subscribe, unsubscribe or fetch.
        let callbacks: Vec<Callback> = match self.slots.get(key) {
            Some(slot) => slot.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return,
        };

        for callback in callbacks {
            callback(entry);
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.slots.len())
            .field("config", &self.config)
            .finish()
    }
}

async fn run_fetch(cache: QueryCache, key: QueryKey, generation: u64, fetcher: QueryFn) {
    let result = fetcher().await;
    cache.settle(&key, generation, result);
}

/// Handle returned by [`QueryCache::subscribe`].
///
/// The callback stays registered until [`unsubscribe`](Self::unsubscribe) is
/// called; dropping the handle does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    cache: QueryCache,
    key: QueryKey,
    id: u64,
}

impl Subscription {
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Removes the callback. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        self.cache.unsubscribe(&self.key, self.id);
    }
}

/// Active interest in a key, released on drop. See [`QueryCache::observe`].
#[must_use = "interest is released as soon as it is dropped"]
#[derive(Debug)]
pub struct Interest {
    cache: QueryCache,
    key: QueryKey,
}

impl Interest {
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for Interest {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}
