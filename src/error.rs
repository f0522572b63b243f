//! Error types.
//!
//! Fetch failures ([`QueryError`]) are absorbed by the cache and stored in the
//! query entry, so they are `Clone` and compare by value. Input validation
//! failures ([`ValidationError`]) never reach the cache: they close a
//! controller's gate before any fetch is attempted.

use thiserror::Error;

/// Error type for fetch operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// The request never completed.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body was not the expected JSON.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Another error with a human readable prefix.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<QueryError>,
    },
}

impl QueryError {
    /// Builds an [`QueryError::Http`] from a status code and reason phrase.
    pub fn http(status: u16, status_text: impl Into<String>) -> Self {
        Self::Http {
            status,
            status_text: status_text.into(),
        }
    }

    /// Wraps this error with a prefix, e.g. `"Failed to fetch todos"`.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the HTTP status code, looking through any context wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Context { source, .. } => source.status(),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }

    /// Returns the innermost error, without context wrappers.
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// A caller-supplied todo id that can never be fetched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0:?} is not an integer")]
    NotAnInteger(String),

    #[error("id {id} is outside {min}..={max}")]
    OutOfRange { id: i64, min: u32, max: u32 },
}

/// Error type for polling timers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingError {
    #[error("polling interval must be greater than zero")]
    ZeroInterval,
}
