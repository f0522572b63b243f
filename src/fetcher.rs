//! The transport seam.
//!
//! The cache never talks to the network itself. It runs a [`QueryFn`], which
//! is usually built from a [`Fetcher`] and a URL with [`get`].
//!
//! - [`mock::MockFetcher`]: scripted responses for tests
//! - `http::HttpFetcher`: a `reqwest` adapter (feature `http`)

#[cfg(feature = "http")]
pub mod http;
pub mod mock;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::QueryError;

/// Performs a GET request and decodes the body as JSON.
///
/// Implementations report non-2xx responses as [`QueryError::Http`] and
/// transport failures as [`QueryError::Network`].
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Value, QueryError>>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Value, QueryError>> {
        (**self).fetch(url)
    }
}

/// The function a query runs to produce its data.
pub type QueryFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync>;

/// Builds a [`QueryFn`] that fetches `url` with `fetcher` each time it runs.
pub fn get(fetcher: Arc<dyn Fetcher>, url: impl Into<String>) -> QueryFn {
    let url = url.into();
    Arc::new(move || fetcher.fetch(&url))
}
