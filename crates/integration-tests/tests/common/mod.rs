//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rb_core::events::DomainEvent;
use rb_core::traits::EventTransport;
use rb_db_sqlite::SqliteCommentStore;

/// A fresh, migrated in-memory SQLite store.
pub async fn sqlite_store() -> Arc<SqliteCommentStore> {
    let store = SqliteCommentStore::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory sqlite");
    Arc::new(store)
}

/// A transport that is permanently down. Counts every attempt.
#[derive(Default)]
pub struct DownTransport {
    attempts: AtomicUsize,
}

impl DownTransport {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventTransport for DownTransport {
    async fn publish(&self, _exchange: &str, _routing_key: &str, _event: &DomainEvent) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("connection refused")
    }
}
