use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::QueryError;

/// Fetch status of a query entry.
///
/// ```text
/// idle ──► pending ──► success | error
/// success | error ──► fetching ──► success | error
/// ```
///
/// `pending` is a first load with nothing to show yet, `fetching` is a
/// background refresh over data (or an error) the user has already seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryStatus {
    /// No fetch attempted yet, or the query is disabled.
    #[default]
    Idle,
    /// First fetch in flight, no prior data.
    Pending,
    /// Refetch in flight over prior data or a prior error.
    Fetching,
    /// Last fetch succeeded.
    Success,
    /// Last fetch failed.
    Error,
}

/// Handle to the fetch currently running for a key.
///
/// Every caller that asks for the key while the fetch runs receives a clone
/// of the same handle. Awaiting [`settled`](Self::settled) resolves once the
/// result has been applied to the cache, or discarded as superseded.
#[derive(Clone)]
pub struct InFlight {
    pub(crate) generation: u64,
    pub(crate) previous: QueryStatus,
    /// Whether an interest in the key was held when the fetch started.
    pub(crate) observed: bool,
    pub(crate) done: Shared<BoxFuture<'static, ()>>,
}

impl InFlight {
    /// Issue number of this fetch. Later fetches have larger generations.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Waits until the fetch has completed.
    pub async fn settled(self) {
        self.done.await;
    }
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("generation", &self.generation)
            .field("previous", &self.previous)
            .field("observed", &self.observed)
            .finish_non_exhaustive()
    }
}

/// A snapshot of the cached state of one query.
///
/// Entries are handed out by value; mutating the cache never changes a
/// snapshot already returned.
#[derive(Debug, Clone)]
pub struct QueryEntry {
    pub(crate) data: Option<Arc<Value>>,
    pub(crate) error: Option<QueryError>,
    pub(crate) status: QueryStatus,
    pub(crate) last_fetched_at: Option<Instant>,
    pub(crate) stale_after: Duration,
    pub(crate) invalidated: bool,
    pub(crate) in_flight: Option<InFlight>,
}

impl QueryEntry {
    pub(crate) const fn new(stale_after: Duration) -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            last_fetched_at: None,
            stale_after,
            invalidated: false,
            in_flight: None,
        }
    }

    pub const fn status(&self) -> QueryStatus {
        self.status
    }

    /// Last successfully fetched value. Kept across later failures.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_deref()
    }

    pub fn shared_data(&self) -> Option<Arc<Value>> {
        self.data.clone()
    }

    /// Decodes the data into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Decode`] if the data does not match `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, QueryError> {
        self.data
            .as_deref()
            .map(|value| T::deserialize(value).map_err(QueryError::from))
            .transpose()
    }

    /// Last fetch failure, cleared by the next success.
    pub const fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Time of the last successful fetch.
    pub const fn last_fetched_at(&self) -> Option<Instant> {
        self.last_fetched_at
    }

    pub const fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub const fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    /// Checks whether this entry is stale at `now`.
    ///
    /// An entry that never fetched successfully, or that was invalidated, is
    /// always stale.
    pub fn is_stale_at(&self, now: Instant) -> bool {
        if self.invalidated {
            return true;
        }
        self.last_fetched_at
            .is_none_or(|at| now.saturating_duration_since(at) > self.stale_after)
    }

    pub(crate) fn begin(&mut self, in_flight: InFlight) {
        self.status = if self.data.is_some() || self.error.is_some() {
            QueryStatus::Fetching
        } else {
            QueryStatus::Pending
        };
        self.in_flight = Some(in_flight);
    }

    pub(crate) fn succeed(&mut self, value: Value, now: Instant) {
        self.data = Some(Arc::new(value));
        self.error = None;
        self.status = QueryStatus::Success;
        self.last_fetched_at = Some(now);
        self.invalidated = false;
        self.in_flight = None;
    }

    pub(crate) fn fail(&mut self, error: QueryError) {
        self.error = Some(error);
        self.status = QueryStatus::Error;
        self.in_flight = None;
    }

    /// Drops the running fetch and restores the status it replaced.
    ///
    /// Only fetches started on behalf of an interest are dropped. A fetch
    /// issued without one (a poll tick, a direct fetch) keeps running.
    pub(crate) fn abandon(&mut self) -> Option<InFlight> {
        if !self.in_flight.as_ref().is_some_and(|in_flight| in_flight.observed) {
            return None;
        }
        let in_flight = self.in_flight.take()?;
        self.status = in_flight.previous;
        Some(in_flight)
    }
}
