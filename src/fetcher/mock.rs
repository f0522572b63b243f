//! Mock fetcher for testing.
//!
//! [`MockFetcher`] answers requests from a script instead of the network, so
//! cache and controller behavior can be tested deterministically.
//!
//! # Basic Usage
//!
//! ```
//! use serde_json::json;
//! use todo_query::fetcher::mock::MockFetcher;
//!
//! let mock = MockFetcher::new();
//! mock.respond_json("https://api.test/todos/1", json!({ "id": 1 }));
//! mock.respond_status("https://api.test/todos/2", 500, "Internal Server Error");
//! assert_eq!(mock.calls("https://api.test/todos/1"), 0);
//! ```
//!
//! # Controlling completion order
//!
//! [`MockFetcher::defer`] queues a response that stays pending until the
//! returned [`Responder`] is resolved. This is how tests hold a fetch in
//! flight, e.g. to check deduplication or superseded results.
//!
//! ```
//! # use serde_json::json;
//! # use todo_query::fetcher::mock::MockFetcher;
//! let mock = MockFetcher::new();
//! let responder = mock.defer("https://api.test/todos/1");
//! // ... start a fetch, assert on the pending state ...
//! responder.ok(json!({ "id": 1 }));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;

use super::Fetcher;
use crate::error::QueryError;

type Response = Result<Value, QueryError>;

#[derive(Debug, Default)]
struct Route {
    ready: Option<Response>,
    deferred: VecDeque<oneshot::Receiver<Response>>,
}

/// A scripted [`Fetcher`].
///
/// Clones share the same script and call counters, so one clone can be handed
/// to the code under test while the test keeps another.
///
/// For each request, a queued deferred response is used first, then the
/// standing response set with [`respond`](Self::respond). Unknown URLs answer
/// `404 Not Found`.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    routes: Arc<DashMap<String, Route>>,
    calls: Arc<DashMap<String, usize>>,
}

impl MockFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the standing response for `url`.
    pub fn respond(&self, url: impl Into<String>, response: Response) {
        self.routes.entry(url.into()).or_default().ready = Some(response);
    }

    /// Sets a standing successful JSON response for `url`.
    pub fn respond_json(&self, url: impl Into<String>, value: Value) {
        self.respond(url, Ok(value));
    }

    /// Sets a standing HTTP failure for `url`.
    pub fn respond_status(&self, url: impl Into<String>, status: u16, status_text: &str) {
        self.respond(url, Err(QueryError::http(status, status_text)));
    }

    /// Queues a response for the next request to `url` that completes only
    /// when the returned [`Responder`] is resolved.
    ///
    /// Dropping the responder fails the request with a network error.
    #[must_use = "the request stays pending until the responder is resolved"]
    pub fn defer(&self, url: impl Into<String>) -> Responder {
        let (tx, rx) = oneshot::channel();
        self.routes.entry(url.into()).or_default().deferred.push_back(rx);
        Responder { tx }
    }

    /// Returns how many requests were made for `url`.
    #[must_use]
    pub fn calls(&self, url: &str) -> usize {
        self.calls.get(url).map_or(0, |count| *count)
    }

    /// Returns how many requests were made in total.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|count| *count.value()).sum()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Value, QueryError>> {
        *self.calls.entry(url.to_string()).or_insert(0) += 1;

        let (deferred, ready) = match self.routes.get_mut(url) {
            Some(mut route) => (route.deferred.pop_front(), route.ready.clone()),
            None => (None, None),
        };

        match deferred {
            Some(rx) => async move {
                rx.await
                    .unwrap_or_else(|_| Err(QueryError::Network("request dropped".to_string())))
            }
            .boxed(),
            None => {
                let response =
                    ready.unwrap_or_else(|| Err(QueryError::http(404, "Not Found")));
                futures::future::ready(response).boxed()
            }
        }
    }
}

/// Completes a request queued with [`MockFetcher::defer`].
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Response>,
}

impl Responder {
    /// Completes the request with `response`.
    ///
    /// Resolving before the request is made is fine: the response is held
    /// until the request picks it up.
    pub fn resolve(self, response: Response) {
        let _ = self.tx.send(response);
    }

    pub fn ok(self, value: Value) {
        self.resolve(Ok(value));
    }

    pub fn fail(self, error: QueryError) {
        self.resolve(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_url_is_not_found() {
        let mock = MockFetcher::new();
        let result = mock.fetch("https://api.test/missing").await;
        assert_eq!(result, Err(QueryError::http(404, "Not Found")));
        assert_eq!(mock.calls("https://api.test/missing"), 1);
    }

    #[tokio::test]
    async fn test_standing_response_is_reused() {
        let mock = MockFetcher::new();
        mock.respond_json("u", json!(1));

        assert_eq!(mock.fetch("u").await, Ok(json!(1)));
        assert_eq!(mock.fetch("u").await, Ok(json!(1)));
        assert_eq!(mock.calls("u"), 2);
    }

    #[tokio::test]
    async fn test_deferred_response_takes_precedence_once() {
        let mock = MockFetcher::new();
        mock.respond_json("u", json!("standing"));
        let responder = mock.defer("u");

        let pending = mock.fetch("u");
        responder.ok(json!("deferred"));

        assert_eq!(pending.await, Ok(json!("deferred")));
        assert_eq!(mock.fetch("u").await, Ok(json!("standing")));
    }

    #[tokio::test]
    async fn test_dropped_responder_is_network_error() {
        let mock = MockFetcher::new();
        let responder = mock.defer("u");
        let pending = mock.fetch("u");
        drop(responder);

        assert!(matches!(pending.await, Err(QueryError::Network(_))));
    }

    #[test]
    fn test_clones_share_counters() {
        let mock1 = MockFetcher::new();
        let mock2 = mock1.clone();

        drop(mock1.fetch("a"));
        drop(mock2.fetch("b"));

        assert_eq!(mock1.total_calls(), 2);
        assert_eq!(mock2.calls("a"), 1);
    }
}
