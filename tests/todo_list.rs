// Integration tests for the todo list: loading, refetch failures and subscribers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use todo_query::{
    fetcher::mock::MockFetcher,
    prelude::*,
    todos::{Todo, TodoConfig, TodoService},
};

const TODOS_URL: &str = "https://api.test/todos";

fn todos(count: u32) -> Value {
    (1..=count)
        .map(|id| json!({ "userId": 1, "id": id, "title": format!("todo {id}"), "completed": false }))
        .collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn service(mock: &MockFetcher) -> TodoService {
    TodoService::with_config(
        mock.clone(),
        TodoConfig {
            base_url: "https://api.test".to_string(),
            ..TodoConfig::default()
        },
    )
}

#[tokio::test]
async fn test_list_loads_then_keeps_data_on_server_error() {
    init_tracing();
    let mock = MockFetcher::new();
    mock.respond_json(TODOS_URL, todos(3));
    let service = service(&mock);
    let cache = service.cache();

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&statuses);
    let _sub = cache.subscribe(service.todos().key(), move |entry| {
        log.lock().unwrap().push(entry.status());
    });

    let list = service.todo_list(&cache);
    assert!(list.is_pending());
    list.entry()
        .in_flight()
        .cloned()
        .expect("list fetches on creation")
        .settled()
        .await;

    assert!(list.is_success());
    let loaded: Vec<Todo> = list.data_as().unwrap().unwrap();
    assert_eq!(loaded.len(), 3);

    mock.respond_status(TODOS_URL, 500, "Internal Server Error");
    let outcome = list.refetch();
    assert!(outcome.is_started());
    assert!(list.is_fetching());
    outcome.settled().await;

    assert!(list.is_error());
    assert_eq!(list.data().as_deref(), Some(&todos(3)));
    let error = list.error().expect("error is stored");
    assert_eq!(error.status(), Some(500));
    assert_eq!(
        error.to_string(),
        "Failed to fetch todos: HTTP 500: Internal Server Error"
    );

    assert_eq!(
        *statuses.lock().unwrap(),
        vec![
            QueryStatus::Pending,
            QueryStatus::Success,
            QueryStatus::Fetching,
            QueryStatus::Error
        ]
    );
    assert_eq!(mock.calls(TODOS_URL), 2);
}

#[tokio::test]
async fn test_two_consumers_share_one_request() {
    init_tracing();
    let mock = MockFetcher::new();
    let responder = mock.defer(TODOS_URL);
    let service = service(&mock);
    let cache = service.cache();

    let first = service.todo_list(&cache);
    let second = service.todo_list(&cache);
    let joined = second.refetch();
    assert!(matches!(joined, FetchOutcome::Joined(_)));

    responder.ok(todos(2));
    joined.settled().await;

    assert!(first.is_success());
    assert_eq!(first.data(), second.data());
    assert_eq!(mock.calls(TODOS_URL), 1);
}

#[tokio::test]
async fn test_subscriber_can_refetch_from_callback() {
    init_tracing();
    let mock = MockFetcher::new();
    mock.respond_status(TODOS_URL, 503, "Service Unavailable");
    let service = service(&mock);
    let cache = service.cache();
    let query = service.todos();

    // Retry once from inside the callback on the first failure.
    let retried = Arc::new(AtomicBool::new(false));
    let retry_cache = cache.clone();
    let retry_query = query.clone();
    let retry_mock = mock.clone();
    let flag = Arc::clone(&retried);
    let _sub = cache.subscribe(query.key(), move |entry| {
        if entry.status() == QueryStatus::Error && !flag.swap(true, Ordering::SeqCst) {
            retry_mock.respond_json(TODOS_URL, todos(1));
            retry_cache.fetch(&retry_query, FetchOptions::new());
        }
    });

    cache.fetch(&query, FetchOptions::new()).settled().await;
    if let Some(in_flight) = cache.get_or_create(query.key()).in_flight().cloned() {
        in_flight.settled().await;
    }

    assert!(retried.load(Ordering::SeqCst));
    assert_eq!(cache.get_or_create(query.key()).status(), QueryStatus::Success);
    assert_eq!(mock.calls(TODOS_URL), 2);
}
