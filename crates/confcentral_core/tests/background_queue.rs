mod common;

use common::{conference_draft, session_draft, signed_in};
use confcentral_core::queue::{spawn_announcement_refresh, spawn_worker};
use confcentral_core::{
    BackgroundQueue, CacheStore, ConferenceResult, ConferenceService, Database, LogNotifier,
    MemoryCache, RetryPolicy, Task, TaskDispatcher, TaskHandler, WorkQueue,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct FailingHandler {
    calls: AtomicU32,
}

impl TaskHandler for FailingHandler {
    fn handle(&self, _task: &Task) -> ConferenceResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(confcentral_core::ConferenceError::Transient("store busy".to_string()))
    }
}

struct CountingHandler {
    inner: TaskDispatcher,
    calls: AtomicU32,
}

impl TaskHandler for CountingHandler {
    fn handle(&self, task: &Task) -> ConferenceResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.handle(task)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_refreshes_views_after_wishlist_changes() {
    let db = Database::open_in_memory().unwrap();
    let cache = Arc::new(MemoryCache::new());
    let (queue, receiver) = BackgroundQueue::channel();
    let queue = Arc::new(queue);
    let service = ConferenceService::new(
        db,
        cache.clone(),
        queue.clone(),
        Arc::new(signed_in("organizer")),
    );
    let dispatcher = TaskDispatcher::new(service.views().clone(), Arc::new(LogNotifier));
    let worker = spawn_worker(receiver, Arc::new(dispatcher), RetryPolicy::immediate(3));

    let conference = service
        .create_conference(&conference_draft("RustConf", 10))
        .unwrap();
    let key = conference.id.to_string();
    let session = service
        .create_session(&key, &session_draft("Ownership", "Ada"))
        .unwrap();
    service
        .create_session(&key, &session_draft("Borrowing", "Ada"))
        .unwrap();
    service
        .add_session_to_wishlist(&session.id.to_string())
        .unwrap();

    queue.close();
    let stats = worker.await.unwrap();
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.processed, 4);

    let cached = cache
        .get(&confcentral_core::cache::top_sessions_key(conference.id))
        .unwrap();
    assert!(cached.contains("\"wish_list_count\":1"));
    assert!(cache
        .get(&confcentral_core::cache::featured_speakers_key(conference.id))
        .is_some());
}

#[tokio::test]
async fn exhausted_task_is_counted_not_surfaced() {
    let (queue, receiver) = BackgroundQueue::channel();
    let handler = Arc::new(FailingHandler {
        calls: AtomicU32::new(0),
    });
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    };
    let worker = spawn_worker(receiver, handler.clone(), policy);

    queue
        .enqueue(Task::RecomputeTopSessions(Uuid::new_v4()))
        .unwrap();
    queue.close();

    let stats = worker.await.unwrap();
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.failed, 1);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    assert!(queue
        .enqueue(Task::RecomputeTopSessions(Uuid::new_v4()))
        .is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn announcement_refresher_runs_on_start() {
    let db = Database::open_in_memory().unwrap();
    let cache = Arc::new(MemoryCache::new());
    let (queue, _receiver) = BackgroundQueue::channel();
    let service = ConferenceService::new(
        db,
        cache.clone(),
        Arc::new(queue),
        Arc::new(signed_in("organizer")),
    );
    service
        .create_conference(&conference_draft("Tiny", 2))
        .unwrap();

    let refresher = spawn_announcement_refresh(service.views().clone(), Duration::from_secs(3600));
    let mut updates = refresher.subscribe();
    tokio::time::timeout(Duration::from_secs(10), updates.changed())
        .await
        .unwrap()
        .unwrap();
    let published = updates.borrow_and_update().clone();
    refresher.abort();

    assert!(published.ends_with("sold out: Tiny"));
    assert_eq!(service.announcement(), published);
}
