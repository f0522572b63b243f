use std::time::Duration;

/// Cache-wide defaults for query behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long data is considered fresh before becoming stale.
    ///
    /// Queries that set their own stale time override this. Fresh data is
    /// served from the cache when a controller activates; stale data is
    /// refetched in the background while still being shown.
    pub stale_time: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(0), // immediately stale
        }
    }
}

impl QueryConfig {
    /// Creates a new query configuration with the given stale time.
    #[must_use]
    pub const fn new(stale_time: Duration) -> Self {
        Self { stale_time }
    }
}
