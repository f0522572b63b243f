//! # todo-query - Cached, deduplicated remote queries
//!
//! todo-query is a client-side data-fetching layer built on [tokio](https://tokio.rs/).
//! It keeps the results of remote requests in a keyed cache, collapses
//! concurrent requests for the same key into one network call, tracks how
//! fresh each result is, and refetches on a fixed schedule when asked to.
//!
//! ## Architecture
//!
//! 1. **Key**: identifies one remote resource, e.g. `["todo", 5]`
//! 2. **Query**: a key plus the async function that fetches it
//! 3. **Cache**: the single store of query state; fetches, dedups and notifies
//! 4. **Controller**: one consumer's view of a query, driven by its inputs
//! 5. **Polling**: refetches a key on a wall-clock interval
//!
//! ## Core Components
//!
//! - [`QueryCache`](query::QueryCache): Shared store of query entries
//! - [`Query`](query::Query): What a key fetches
//! - [`QueryController`](controller::QueryController): Input-driven enable/key logic
//! - [`PollingTimer`](polling::PollingTimer): Fixed-interval refetch
//! - [`TodoService`](todos::TodoService): The todo API bound to all of the above
//!
//! ## Example
//!
//! ```rust,no_run
//! use todo_query::fetcher::mock::MockFetcher;
//! use todo_query::todos::{TodoBoard, TodoService};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TodoService::new(MockFetcher::new());
//! let cache = service.cache();
//!
//! let mut board = TodoBoard::new(service, cache)?;
//! board.hover(1);
//!
//! if let Some(todos) = board.todos()? {
//!     println!("{} todos, next refresh in {}s", todos.len(), board.countdown());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `http`: `fetcher::http::HttpFetcher`, a `reqwest` transport

pub mod controller;
pub mod error;
pub mod fetcher;
pub mod key;
pub mod polling;
pub mod prelude;
pub mod query;
pub mod todos;
