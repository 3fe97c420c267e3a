mod common;
use crate::common::fakes::{counting_callback, reply, ScriptedChangeFeed};
use crate::common::{init_tracing, with_virtual_timeout};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use remotewatch::errors::ObserveError;
use remotewatch::observe::{
    ChangeNotifier, CursorCache, CursorLongPollTask, CursorPollSettings, Delivery,
    ObservationTask,
};
use remotewatch::types::{ObservationScope, TaskState};

fn transport() -> ObserveError {
    ObserveError::Transport("connection reset".to_string())
}

fn build_task(
    path: &str,
    delivery: &Delivery,
    feed: Arc<ScriptedChangeFeed>,
    cache: CursorCache,
) -> (Arc<CursorLongPollTask>, Arc<AtomicUsize>) {
    let (callback, count) = counting_callback();
    let notifier = ChangeNotifier::new(path, delivery.clone(), callback);
    let task = Arc::new(CursorLongPollTask::new(
        path,
        ObservationScope::Descendants,
        notifier,
        feed,
        cache,
        CursorPollSettings::default(),
    ));
    (task, count)
}

fn spawn_worker(task: &Arc<CursorLongPollTask>) -> JoinHandle<()> {
    let task = Arc::clone(task);
    tokio::spawn(async move { task.start().await })
}

#[tokio::test(start_paused = true)]
async fn change_reply_notifies_and_advances_cursor() {
    init_tracing();

    let delivery = Delivery::spawn();
    let cache = CursorCache::new();
    let feed = Arc::new(ScriptedChangeFeed::new(
        vec![Ok("C0".to_string()), Ok("C1".to_string())],
        vec![reply(false, 5), reply(true, 0), reply(false, 10)],
    ));
    let (task, count) = build_task("/docs", &delivery, Arc::clone(&feed), cache.clone());

    let started = Instant::now();
    let worker = spawn_worker(&task);

    with_virtual_timeout(feed.wait_drained()).await;
    delivery.flush().await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(feed.polled_cursors(), vec!["C0", "C0", "C1", "C1"]);
    assert_eq!(feed.cursor_requests(), 2);
    assert_eq!(cache.get("/docs").as_deref(), Some("C1"));
    // Server-requested backoffs only: 5s + 10s.
    assert_eq!(started.elapsed(), Duration::from_secs(15));

    task.stop();
    with_virtual_timeout(worker).await.unwrap();
    assert_eq!(task.state(), TaskState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn cached_cursor_skips_acquisition() {
    init_tracing();

    let delivery = Delivery::spawn();
    let cache = CursorCache::new();
    cache.store("/docs", "CACHED");
    let feed = Arc::new(ScriptedChangeFeed::new(Vec::new(), Vec::new()));
    let (task, _count) = build_task("/docs", &delivery, Arc::clone(&feed), cache);

    let worker = spawn_worker(&task);
    with_virtual_timeout(feed.wait_drained()).await;

    assert_eq!(feed.cursor_requests(), 0);
    assert_eq!(feed.polled_cursors(), vec!["CACHED"]);

    task.stop();
    with_virtual_timeout(worker).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cursor_acquisition_retries_until_success() {
    init_tracing();

    let delivery = Delivery::spawn();
    let cache = CursorCache::new();
    let feed = Arc::new(ScriptedChangeFeed::new(
        vec![Err(transport()), Err(transport()), Ok("C0".to_string())],
        Vec::new(),
    ));
    let (task, _count) = build_task("/docs", &delivery, Arc::clone(&feed), cache.clone());

    let started = Instant::now();
    let worker = spawn_worker(&task);
    with_virtual_timeout(feed.wait_drained()).await;

    assert_eq!(feed.cursor_requests(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(feed.polled_cursors(), vec!["C0"]);
    assert_eq!(cache.get("/docs").as_deref(), Some("C0"));

    task.stop();
    with_virtual_timeout(worker).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_previous_cursor() {
    init_tracing();

    let delivery = Delivery::spawn();
    let cache = CursorCache::new();
    let feed = Arc::new(ScriptedChangeFeed::new(
        vec![Ok("C0".to_string()), Err(transport())],
        vec![reply(true, 0)],
    ));
    let (task, count) = build_task("/docs", &delivery, Arc::clone(&feed), cache.clone());

    let worker = spawn_worker(&task);
    with_virtual_timeout(feed.wait_drained()).await;
    delivery.flush().await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(feed.polled_cursors(), vec!["C0", "C0"]);
    assert_eq!(cache.get("/docs").as_deref(), Some("C0"));

    task.stop();
    with_virtual_timeout(worker).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_longpoll_waits_failure_backoff() {
    init_tracing();

    let delivery = Delivery::spawn();
    let feed = Arc::new(ScriptedChangeFeed::new(
        vec![Ok("C0".to_string())],
        vec![Err(transport()), reply(false, 0)],
    ));
    let (task, count) = build_task("/docs", &delivery, Arc::clone(&feed), CursorCache::new());

    let started = Instant::now();
    let worker = spawn_worker(&task);
    with_virtual_timeout(feed.wait_drained()).await;

    assert_eq!(started.elapsed(), Duration::from_secs(30));
    assert_eq!(feed.polled_cursors(), vec!["C0", "C0", "C0"]);
    delivery.flush().await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    task.stop();
    with_virtual_timeout(worker).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_pending_longpoll() {
    init_tracing();

    let delivery = Delivery::spawn();
    let feed = Arc::new(ScriptedChangeFeed::new(vec![Ok("C0".to_string())], Vec::new()));
    let (task, _count) = build_task("/docs", &delivery, Arc::clone(&feed), CursorCache::new());

    let worker = spawn_worker(&task);
    with_virtual_timeout(feed.wait_drained()).await;

    let stopped_at = Instant::now();
    task.stop();
    with_virtual_timeout(worker).await.unwrap();

    assert!(stopped_at.elapsed() < Duration::from_secs(1));
    assert_eq!(task.state(), TaskState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_cursor_retry() {
    init_tracing();

    let delivery = Delivery::spawn();
    // No cursors scripted: every acquisition attempt fails.
    let feed = Arc::new(ScriptedChangeFeed::new(Vec::new(), Vec::new()));
    let (task, _count) = build_task("/docs", &delivery, Arc::clone(&feed), CursorCache::new());

    let started = Instant::now();
    let worker = spawn_worker(&task);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(feed.cursor_requests(), 1);

    task.stop();
    with_virtual_timeout(worker).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(feed.cursor_requests(), 1);
    assert!(feed.polled_cursors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_longpoll_ends_the_loop() {
    init_tracing();

    let delivery = Delivery::spawn();
    let feed = Arc::new(ScriptedChangeFeed::new(
        vec![Ok("C0".to_string())],
        vec![Err(ObserveError::Unauthorized(401)), reply(true, 0)],
    ));
    let (task, count) = build_task("/docs", &delivery, Arc::clone(&feed), CursorCache::new());

    let worker = spawn_worker(&task);
    with_virtual_timeout(worker).await.unwrap();

    assert_eq!(task.state(), TaskState::Stopped);
    assert_eq!(feed.polled_cursors(), vec!["C0"]);
    delivery.flush().await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn tasks_for_different_paths_share_one_cache() {
    init_tracing();

    let delivery = Delivery::spawn();
    let cache = CursorCache::new();

    let feed_a = Arc::new(ScriptedChangeFeed::new(vec![Ok("A0".to_string())], Vec::new()));
    let feed_b = Arc::new(ScriptedChangeFeed::new(vec![Ok("B0".to_string())], Vec::new()));
    let (task_a, _) = build_task("/a", &delivery, Arc::clone(&feed_a), cache.clone());
    let (task_b, _) = build_task("/b", &delivery, Arc::clone(&feed_b), cache.clone());

    let worker_a = spawn_worker(&task_a);
    let worker_b = spawn_worker(&task_b);
    with_virtual_timeout(feed_a.wait_drained()).await;
    with_virtual_timeout(feed_b.wait_drained()).await;

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("/a").as_deref(), Some("A0"));
    assert_eq!(cache.get("/b").as_deref(), Some("B0"));

    task_a.stop();
    task_b.stop();
    with_virtual_timeout(worker_a).await.unwrap();
    with_virtual_timeout(worker_b).await.unwrap();
}
