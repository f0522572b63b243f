//! Query cache with deduplication, staleness and subscriptions.
//!
//! This module provides the [`QueryCache`], the keyed store of query state,
//! and [`Query`], the description of what a key fetches.
//!
//! # Design Pattern: one cache, many observers
//!
//! The cache is created once and passed explicitly (it is a cheap, cloneable
//! handle). Everything that reads or changes query state goes through it:
//!
//! 1. [`QueryCache::fetch`] starts a fetch, or joins the one already in flight
//! 2. When the fetch completes, the entry is updated and every subscriber of
//!    the key is called synchronously, in subscription order
//! 3. A fetch whose interest has gone away is superseded: its late result is
//!    discarded instead of applied
//!
//! # Example
//!
//! ```rust,ignore
//! use todo_query::prelude::*;
//!
//! let cache = QueryCache::new();
//! let query = Query::new(QueryKey::new("todos"), || Box::pin(fetch_todos()));
//!
//! let _sub = cache.subscribe(query.key(), |entry| {
//!     println!("todos are now {:?}", entry.status());
//! });
//!
//! cache.fetch(&query, FetchOptions::new()).settled().await;
//! ```

mod cache;
mod config;
mod entry;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

pub use cache::{Interest, QueryCache, Subscription};
pub use config::QueryConfig;
pub use entry::{InFlight, QueryEntry, QueryStatus};

use crate::error::QueryError;
use crate::fetcher::QueryFn;
use crate::key::QueryKey;

/// What a query key fetches.
#[derive(Clone)]
pub struct Query {
    key: QueryKey,
    fetcher: QueryFn,
    stale_time: Option<Duration>,
}

impl Query {
    /// Creates a new query with the given key and fetcher.
    ///
    /// # Arguments
    ///
    /// * `key` - Identifies the cache entry this query reads and writes
    /// * `fetcher` - An async function that fetches the data
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let query = Query::new(QueryKey::new("todo").with(1), || {
    ///     Box::pin(async { fetch_todo(1).await })
    /// });
    /// ```
    pub fn new<F>(key: impl Into<QueryKey>, fetcher: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync + 'static,
    {
        Self::from_fn(key, Arc::new(fetcher))
    }

    pub fn from_fn(key: impl Into<QueryKey>, fetcher: QueryFn) -> Self {
        Self {
            key: key.into(),
            fetcher,
            stale_time: None,
        }
    }

    /// Overrides the cache's default stale time for this key.
    #[must_use]
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    pub const fn stale_time(&self) -> Option<Duration> {
        self.stale_time
    }

    pub(crate) fn fetcher(&self) -> QueryFn {
        Arc::clone(&self.fetcher)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("key", &self.key)
            .field("stale_time", &self.stale_time)
            .finish_non_exhaustive()
    }
}

/// Per-call options for [`QueryCache::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// A disabled fetch is a no-op.
    pub enabled: bool,
    /// Skip the fetch when the entry holds fresh data.
    pub only_if_stale: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchOptions {
    /// Enabled, regardless of staleness.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: true,
            only_if_stale: false,
        }
    }

    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub const fn only_if_stale(mut self, only_if_stale: bool) -> Self {
        self.only_if_stale = only_if_stale;
        self
    }
}

/// What a call to [`QueryCache::fetch`] did.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The call was disabled; nothing changed.
    Disabled,
    /// The entry held fresh data and the call asked for stale data only.
    Fresh,
    /// A new fetch was issued.
    Started(InFlight),
    /// A fetch was already in flight; no new request was made.
    Joined(InFlight),
}

impl FetchOutcome {
    pub const fn in_flight(&self) -> Option<&InFlight> {
        match self {
            Self::Started(in_flight) | Self::Joined(in_flight) => Some(in_flight),
            Self::Disabled | Self::Fresh => None,
        }
    }

    /// Returns `true` if this call issued a network request.
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    /// Waits for the fetch this call started or joined, if any.
    pub async fn settled(self) {
        if let Self::Started(in_flight) | Self::Joined(in_flight) = self {
            in_flight.settled().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_options_default() {
        let options = FetchOptions::default();
        assert!(options.enabled);
        assert!(!options.only_if_stale);

        let options = FetchOptions::new().enabled(false).only_if_stale(true);
        assert!(!options.enabled);
        assert!(options.only_if_stale);
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new(QueryKey::new("todo").with(1), || {
            Box::pin(async { Ok(Value::Null) })
        })
        .with_stale_time(Duration::from_secs(30));

        assert_eq!(query.key(), &QueryKey::new("todo").with(1));
        assert_eq!(query.stale_time(), Some(Duration::from_secs(30)));
        assert!(format!("{query:?}").contains("todo"));
    }

    #[test]
    fn test_outcome_without_fetch_has_no_handle() {
        assert!(FetchOutcome::Disabled.in_flight().is_none());
        assert!(FetchOutcome::Fresh.in_flight().is_none());
        assert!(!FetchOutcome::Fresh.is_started());
    }
}
