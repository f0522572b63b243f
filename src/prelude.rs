//! Prelude module for convenient imports.
//!
//! ```
//! use todo_query::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`QueryCache`], [`Query`], [`FetchOptions`] - Fetching and caching
//! - [`QueryKey`] - Cache keys
//! - [`QueryController`] - Input-driven queries
//! - [`PollingTimer`], [`Countdown`] - Scheduled refetch
//! - [`Fetcher`] - The transport seam
//! - [`QueryError`] - What failed fetches store

pub use crate::controller::QueryController;
pub use crate::error::{PollingError, QueryError, ValidationError};
pub use crate::fetcher::Fetcher;
pub use crate::key::{KeyPart, QueryKey};
pub use crate::polling::{Countdown, PollingTimer};
pub use crate::query::{
    FetchOptions, FetchOutcome, Query, QueryCache, QueryConfig, QueryEntry, QueryStatus,
};
