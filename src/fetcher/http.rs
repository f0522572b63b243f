//! `reqwest` transport.

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::Fetcher;
use crate::error::QueryError;

/// A [`Fetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Network`] if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, QueryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Value, QueryError>> {
        let request = self.client.get(url);

        async move {
            let response = request
                .send()
                .await
                .map_err(|e| QueryError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(QueryError::http(
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default(),
                ));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| QueryError::Decode(e.to_string()))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_client() {
        assert!(HttpFetcher::new(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let fetcher = HttpFetcher::new(Duration::from_millis(500))
            .expect("client should build");
        let result = fetcher.fetch("http://127.0.0.1:9/todos").await;
        assert!(matches!(result, Err(QueryError::Network(_))));
    }
}
