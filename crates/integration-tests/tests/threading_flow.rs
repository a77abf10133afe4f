//! End-to-end threading against the SQLite store.

mod common;

use std::sync::Arc;

use rb_broker_local::LocalBroker;
use rb_core::error::AppError;
use rb_core::events::{ALL_COMMENT_EVENTS, COMMENT_EXCHANGE, NOTIFICATION_QUEUE};
use rb_core::models::{REPLY_DEPTH, ROOT_DEPTH};
use rb_core::pagination::PageRequest;
use rb_db_sqlite::SqliteCommentStore;
use rb_services::{CommentCounters, EventPublisher, PublishWorker, ThreadingEngine};

fn engine_over_local_broker(store: Arc<SqliteCommentStore>) -> (ThreadingEngine, Arc<LocalBroker>, PublishWorker) {
    let broker = Arc::new(LocalBroker::new());
    let (events, worker) = EventPublisher::spawn(broker.clone(), COMMENT_EXCHANGE, 64);
    (ThreadingEngine::new(store, events), broker, worker)
}

#[tokio::test]
async fn create_then_read_round_trips() {
    let (engine, _broker, _worker) = engine_over_local_broker(common::sqlite_store().await);

    let root = engine.create(1, 10, "  hello  ", None).await.unwrap();
    let reply = engine.create(1, 11, "hi back", Some(root)).await.unwrap();

    let stored = engine.read(root).await.unwrap();
    assert_eq!(stored.thread_id, 1);
    assert_eq!(stored.author_id, 10);
    assert_eq!(stored.content, "  hello  ");
    assert_eq!(stored.depth, ROOT_DEPTH);
    assert_eq!(stored.parent_id, None);

    let stored = engine.read(reply).await.unwrap();
    assert_eq!(stored.depth, REPLY_DEPTH);
    assert_eq!(stored.parent_id, Some(root));

    engine.update(reply, "edited").await.unwrap();
    let edited = engine.read(reply).await.unwrap();
    assert_eq!(edited.content, "edited");
    assert_eq!(edited.created_at, stored.created_at);
    assert!(edited.updated_at >= stored.updated_at);
}

#[tokio::test]
async fn hierarchical_listing_and_guarded_delete() {
    let (engine, _broker, _worker) = engine_over_local_broker(common::sqlite_store().await);

    let r1 = engine.create(1, 10, "R1", None).await.unwrap();
    let r2 = engine.create(1, 11, "R2", None).await.unwrap();
    let c1 = engine.create(1, 12, "c1", Some(r1)).await.unwrap();
    let c2 = engine.create(1, 13, "c2", Some(r1)).await.unwrap();

    let page = engine.list_hierarchical(1, PageRequest::new(1, 10)).await.unwrap();
    assert_eq!(page.total, 2);
    let shape: Vec<_> = page.items.iter().map(|n| (n.comment.id, n.children.len())).collect();
    assert_eq!(shape, vec![(r1, 2), (r2, 0)]);
    let children: Vec<_> = page.items[0].children.iter().map(|c| c.id).collect();
    assert_eq!(children, vec![c1, c2]);

    // flat listing mixes roots and replies in creation order
    let flat = engine.list_flat(1, PageRequest::new(1, 3)).await.unwrap();
    assert_eq!(flat.total, 4);
    assert_eq!(flat.items.iter().map(|c| c.id).collect::<Vec<_>>(), vec![r1, r2, c1]);
    assert!(!flat.window.has_next);
    assert_eq!(flat.window.end, 2);

    assert!(matches!(engine.delete(r1).await, Err(AppError::HasChildren(id)) if id == r1));
    assert!(engine.read(r1).await.is_ok());

    engine.delete(c1).await.unwrap();
    engine.delete(c2).await.unwrap();
    engine.delete(r1).await.unwrap();

    assert!(matches!(engine.read(r1).await, Err(AppError::NotFound(..))));
    assert_eq!(engine.count_in_thread(1).await.unwrap(), 1);
}

#[tokio::test]
async fn threading_rules_hold_against_sqlite() {
    let (engine, _broker, _worker) = engine_over_local_broker(common::sqlite_store().await);

    let root = engine.create(1, 10, "root", None).await.unwrap();
    let reply = engine.create(1, 11, "reply", Some(root)).await.unwrap();

    assert!(matches!(
        engine.create(1, 12, "too deep", Some(reply)).await,
        Err(AppError::InvalidDepth(id)) if id == reply
    ));
    assert!(matches!(
        engine.create(2, 12, "wrong thread", Some(root)).await,
        Err(AppError::CrossThreadReply { parent_thread: 1, thread_id: 2, .. })
    ));
    assert!(matches!(
        engine.create(1, 12, "ghost", Some(uuid::Uuid::now_v7())).await,
        Err(AppError::NotFound(..))
    ));

    // rejected writes leave nothing behind
    assert_eq!(engine.count_in_thread(1).await.unwrap(), 2);
    assert_eq!(engine.count_in_thread(2).await.unwrap(), 0);
    assert_eq!(engine.count_under_parent(root).await.unwrap(), 1);
}

#[tokio::test]
async fn counters_follow_the_event_stream() {
    let store = common::sqlite_store().await;
    let (engine, broker, worker) = engine_over_local_broker(store);
    let counters = Arc::new(CommentCounters::new());
    let consumer = broker.subscribe(COMMENT_EXCHANGE, NOTIFICATION_QUEUE, ALL_COMMENT_EVENTS, counters.clone());

    for thread_id in 1..=3 {
        counters.reset_thread(thread_id, 0);
    }
    let root = engine.create(1, 10, "root", None).await.unwrap();
    counters.reset_replies(root, 0);
    let reply = engine.create(1, 11, "reply", Some(root)).await.unwrap();
    engine.create(1, 12, "another reply", Some(root)).await.unwrap();
    engine.create(2, 10, "elsewhere", None).await.unwrap();
    engine.update(reply, "edited").await.unwrap();
    engine.delete(reply).await.unwrap();

    let doomed = engine.create(3, 10, "doomed root", None).await.unwrap();
    engine.create(3, 11, "doomed reply", Some(doomed)).await.unwrap();
    assert_eq!(engine.purge_thread(3).await.unwrap(), 2);

    // drain the publisher, then close the queues so the consumer finishes
    drop(engine);
    worker.join().await;
    drop(broker);
    consumer.await.unwrap();

    assert_eq!(counters.thread_count(1), Some(2));
    assert_eq!(counters.thread_count(2), Some(1));
    assert_eq!(counters.thread_count(3), Some(0));
    assert_eq!(counters.reply_count(root), Some(1));
    assert_eq!(counters.reply_count(doomed), None);
}
