//! The todo client.
//!
//! [`TodoService`] binds the query cache to the JSONPlaceholder todo API:
//!
//! - `["todos"]`: the whole list, polled every [`TodoConfig::refetch_interval`]
//! - `["todo", id]`: one todo, shown in the hover popover
//! - `["todo-dynamic", id]`: one todo, looked up on demand by typed id
//!
//! [`TodoBoard`] and [`TodoLookup`] hold the non-rendering state of the list
//! view and the lookup view.

mod board;
mod lookup;

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

pub use board::TodoBoard;
pub use lookup::{MAX_TODO_ID, MIN_TODO_ID, TodoLookup, parse_todo_id};

use crate::controller::QueryController;
use crate::fetcher::Fetcher;
use crate::key::{KeyPart, QueryKey};
use crate::query::{Query, QueryCache, QueryConfig};

/// Base URL of the public todo API.
pub const API_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// A todo item from the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    #[serde(rename = "userId")]
    pub user_id: u32,
    pub id: u32,
    pub title: String,
    pub completed: bool,
}

/// Settings for [`TodoService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoConfig {
    pub base_url: String,
    /// How often the list refetches in the background.
    pub refetch_interval: Duration,
    /// How long a hovered todo's details stay fresh.
    pub detail_stale_time: Duration,
    /// Default freshness for every other query.
    pub stale_time: Duration,
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            refetch_interval: Duration::from_secs(10),
            detail_stale_time: Duration::from_secs(30),
            stale_time: Duration::from_secs(5),
        }
    }
}

impl TodoConfig {
    /// Cache configuration matching these settings.
    #[must_use]
    pub const fn query_config(&self) -> QueryConfig {
        QueryConfig::new(self.stale_time)
    }
}

/// Builds the todo queries and controllers.
#[derive(Clone)]
pub struct TodoService {
    fetcher: Arc<dyn Fetcher>,
    config: TodoConfig,
}

impl TodoService {
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        Self::with_config(fetcher, TodoConfig::default())
    }

    pub fn with_config(fetcher: impl Fetcher + 'static, config: TodoConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            config,
        }
    }

    pub const fn config(&self) -> &TodoConfig {
        &self.config
    }

    /// A cache configured for this service.
    #[must_use]
    pub fn cache(&self) -> QueryCache {
        QueryCache::with_config(self.config.query_config())
    }

    pub fn todos_url(&self) -> String {
        format!("{}/todos", self.config.base_url.trim_end_matches('/'))
    }

    pub fn todo_url(&self, id: impl std::fmt::Display) -> String {
        format!("{}/{id}", self.todos_url())
    }

    /// All todos.
    pub fn todos(&self) -> Query {
        self.query(QueryKey::new("todos"), self.todos_url(), "Failed to fetch todos")
    }

    /// One todo, for the hover popover.
    pub fn todo_by_id(&self, id: u32) -> Query {
        self.query(
            QueryKey::new("todo").with(id),
            self.todo_url(id),
            format!("Failed to fetch todo {id}"),
        )
        .with_stale_time(self.config.detail_stale_time)
    }

    /// One todo, for the lookup view. `id` is whatever the user typed.
    pub fn todo_by_id_dynamic(&self, id: KeyPart) -> Query {
        let label = match &id {
            KeyPart::Str(raw) => raw.clone(),
            other => other.to_string(),
        };
        self.query(
            QueryKey::new("todo-dynamic").with(id),
            self.todo_url(&label),
            format!("Failed to fetch todo {label}"),
        )
    }

    /// The list controller. Enabled from the start.
    pub fn todo_list(&self, cache: &QueryCache) -> QueryController<()> {
        QueryController::fixed(cache.clone(), self.todos())
    }

    /// The popover controller for a hovered todo. Enabled when `id > 0`.
    pub fn todo_detail(&self, cache: &QueryCache, id: u32) -> QueryController<u32> {
        let service = self.clone();
        QueryController::builder(cache.clone(), id, move |id| service.todo_by_id(*id))
            .enabled_when("positive id", |id| *id > 0)
            .build()
    }

    /// The lookup controller, gated on a valid id and an explicit submit.
    pub fn todo_lookup(&self, cache: &QueryCache) -> QueryController<TodoLookup> {
        let service = self.clone();
        QueryController::builder(cache.clone(), TodoLookup::default(), move |lookup| {
            let id = match lookup.parsed_id() {
                Ok(id) => KeyPart::from(id),
                Err(_) => KeyPart::from(lookup.id_text().trim()),
            };
            service.todo_by_id_dynamic(id)
        })
        .enabled_when("valid id", TodoLookup::is_valid)
        .enabled_when("requested", TodoLookup::is_requested)
        .build()
    }

    fn query(&self, key: QueryKey, url: String, context: impl Into<String>) -> Query {
        let fetcher = Arc::clone(&self.fetcher);
        let context = context.into();
        Query::new(key, move || {
            let context = context.clone();
            fetcher
                .fetch(&url)
                .map(move |result| result.map_err(|err| err.context(context)))
                .boxed()
        })
    }
}

impl std::fmt::Debug for TodoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::mock::MockFetcher;
    use crate::query::{FetchOptions, QueryStatus};
    use serde_json::json;

    fn service(mock: &MockFetcher) -> TodoService {
        TodoService::with_config(
            mock.clone(),
            TodoConfig {
                base_url: "https://api.test/".to_string(),
                ..TodoConfig::default()
            },
        )
    }

    #[test]
    fn test_default_config_matches_app() {
        let config = TodoConfig::default();
        assert_eq!(config.base_url, API_BASE_URL);
        assert_eq!(config.refetch_interval, Duration::from_secs(10));
        assert_eq!(config.detail_stale_time, Duration::from_secs(30));
        assert_eq!(config.query_config().stale_time, Duration::from_secs(5));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: TodoConfig =
            serde_json::from_value(json!({ "base_url": "http://localhost:3000" }))
                .expect("config should deserialize");
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.refetch_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_urls_and_keys() {
        let mock = MockFetcher::new();
        let service = service(&mock);

        assert_eq!(service.todos_url(), "https://api.test/todos");
        assert_eq!(service.todo_url(7), "https://api.test/todos/7");
        assert_eq!(service.todos().key(), &QueryKey::new("todos"));
        assert_eq!(service.todo_by_id(7).key(), &QueryKey::new("todo").with(7));
        assert_eq!(
            service.todo_by_id(7).stale_time(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            service.todo_by_id_dynamic(KeyPart::from(7_u32)).key(),
            &QueryKey::new("todo-dynamic").with(7)
        );
    }

    #[test]
    fn test_todo_json_shape() {
        let todo: Todo = serde_json::from_value(json!({
            "userId": 1,
            "id": 2,
            "title": "quis ut nam facilis",
            "completed": false
        }))
        .expect("todo should deserialize");

        assert_eq!(todo.user_id, 1);
        assert_eq!(todo.id, 2);
        assert_eq!(
            serde_json::to_value(&todo).expect("todo should serialize")["userId"],
            json!(1)
        );
    }

    #[tokio::test]
    async fn test_errors_carry_context() {
        let mock = MockFetcher::new();
        mock.respond_status("https://api.test/todos/3", 404, "Not Found");
        let service = service(&mock);
        let cache = service.cache();

        cache
            .fetch(&service.todo_by_id(3), FetchOptions::new())
            .settled()
            .await;

        let entry = cache.get_or_create(&QueryKey::new("todo").with(3));
        assert_eq!(entry.status(), QueryStatus::Error);
        let error = entry.error().expect("error should be stored");
        assert_eq!(error.to_string(), "Failed to fetch todo 3: HTTP 404: Not Found");
        assert_eq!(error.status(), Some(404));
    }

    #[tokio::test]
    async fn test_detail_controller_requires_positive_id() {
        let mock = MockFetcher::new();
        let service = service(&mock);
        let cache = service.cache();

        let detail = service.todo_detail(&cache, 0);
        assert!(!detail.is_enabled());
        assert_eq!(detail.blocked_by(), Some("positive id"));
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_lookup_uses_raw_text_for_invalid_key() {
        let mock = MockFetcher::new();
        let service = service(&mock);
        let cache = service.cache();

        let mut lookup = service.todo_lookup(&cache);
        lookup.update(|l| l.set_id("abc"));

        assert_eq!(lookup.key(), &QueryKey::new("todo-dynamic").with("abc"));
        assert!(!lookup.is_enabled());
    }
}
