//! Fixed-interval polling.
//!
//! This module provides [`PollingTimer`], which refetches one query on a
//! wall-clock schedule, and [`Countdown`], the display-only "next refresh in"
//! value that accompanies it.

use std::time::Duration;

use futures::StreamExt;
use futures::future;
use futures::stream::BoxStream;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::PollingError;
use crate::query::{FetchOptions, Query, QueryCache};

/// Ticks every `period`, starting one period from now.
fn ticks(period: Duration) -> BoxStream<'static, ()> {
    // NOTE: Skip keeps ticks on the original schedule when the runtime falls
    // behind, instead of bursting to catch up.
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    IntervalStream::new(interval)
        .skip(1) // Skip the first immediate tick
        .map(|_| ())
        .boxed()
}

/// Handle for a running polling task.
struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    fn cancel(&self) {
        self.token.cancel();
    }

    fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.join.is_finished()
    }
}

/// Refetches a query at a fixed interval.
///
/// Each tick calls [`QueryCache::fetch`] for the query, regardless of
/// staleness, then invokes the tick callback with the tick number. Ticks
/// follow the wall clock: a slow fetch never delays the next tick, and a tick
/// that lands while a fetch is still in flight joins it instead of issuing a
/// second request.
///
/// Dropping the timer stops it.
///
/// # Example
///
/// ```rust,ignore
/// let mut timer = PollingTimer::new(cache.clone(), todos_query);
/// timer.start(Duration::from_secs(10), |tick| println!("refresh #{tick}"))?;
/// // ...
/// timer.stop();
/// ```
pub struct PollingTimer {
    cache: QueryCache,
    query: Query,
    handle: Option<Handle>,
}

impl PollingTimer {
    #[must_use]
    pub const fn new(cache: QueryCache, query: Query) -> Self {
        Self {
            cache,
            query,
            handle: None,
        }
    }

    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Starts polling every `period`. A running timer is restarted.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PollingError::ZeroInterval`] if `period` is zero.
    pub fn start<F>(&mut self, period: Duration, mut on_tick: F) -> Result<(), PollingError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        if period.is_zero() {
            return Err(PollingError::ZeroInterval);
        }
        self.stop();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let cache = self.cache.clone();
        let query = self.query.clone();
        let mut ticks = ticks(period);

        let join = tokio::spawn(async move {
            let mut count = 0_u64;
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    tick = ticks.next() => {
                        if tick.is_none() {
                            break;
                        }
                        count += 1;
                        debug!(key = %query.key(), tick = count, "poll tick");
                        cache.fetch(&query, FetchOptions::new());
                        on_tick(count);
                    }
                }
            }
        });

        debug!(key = %self.query.key(), ?period, "polling started");
        self.handle = Some(Handle { token, join });
        Ok(())
    }

    /// Cancels future ticks. Stopping a stopped timer is a no-op.
    ///
    /// A fetch already issued by a tick still completes.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
            debug!(key = %self.query.key(), "polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(Handle::is_running)
    }
}

impl Drop for PollingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Seconds until the next poll, for display.
///
/// Counts `interval, interval - 1, ..., 1` and wraps back to `interval`
/// instead of showing `0`. It is driven by its own one-second ticks and has
/// no influence on when fetches happen.
///
/// # Example
///
/// ```
/// use todo_query::polling::Countdown;
///
/// let mut countdown = Countdown::new(3);
/// assert_eq!(countdown.value(), 3);
/// let seen: Vec<u32> = (0..4).map(|_| countdown.tick()).collect();
/// assert_eq!(seen, vec![2, 1, 3, 2]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    interval_secs: u32,
    remaining: u32,
}

impl Countdown {
    /// Creates a countdown starting at `interval_secs` (at least 1).
    #[must_use]
    pub fn new(interval_secs: u32) -> Self {
        let interval_secs = interval_secs.max(1);
        Self {
            interval_secs,
            remaining: interval_secs,
        }
    }

    /// Creates a countdown matching a polling period, rounded to seconds.
    #[must_use]
    pub fn for_period(period: Duration) -> Self {
        Self::new(u32::try_from(period.as_secs()).unwrap_or(u32::MAX))
    }

    pub const fn value(&self) -> u32 {
        self.remaining
    }

    pub const fn interval_secs(&self) -> u32 {
        self.interval_secs
    }

    /// Advances one second and returns the new value.
    pub const fn tick(&mut self) -> u32 {
        self.remaining = if self.remaining <= 1 {
            self.interval_secs
        } else {
            self.remaining - 1
        };
        self.remaining
    }

    pub const fn reset(&mut self) {
        self.remaining = self.interval_secs;
    }

    /// Emits the value after each one-second tick, starting one second from
    /// now.
    pub fn stream(self) -> BoxStream<'static, u32> {
        ticks(Duration::from_secs(1))
            .scan(self, |countdown, ()| future::ready(Some(countdown.tick())))
            .boxed()
    }
}
