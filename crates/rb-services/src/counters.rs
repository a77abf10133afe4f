//! # CommentCounters
//!
//! A downstream consumer of comment events: keeps per-thread comment counts
//! and per-root reply counts for list views that should not hit the store.
//!
//! Counts are a cache. An entry exists only once it has been seeded from the
//! store (see [`CommentCounters::reset_thread`]); events then move it. Counts
//! are eventually consistent with the store and may lag or, when the
//! transport drops an event, drift until the entry is seeded again.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use rb_core::events::{CommentEvent, DomainEvent};
use rb_core::traits::EventHandler;
use tracing::{debug, warn};
use uuid::Uuid;

/// How many recent event ids are remembered for de-duplication.
pub const DEFAULT_DEDUP_WINDOW: usize = 4096;

pub struct CommentCounters {
    threads: DashMap<i64, i64>,
    replies: DashMap<Uuid, i64>,
    seen: Mutex<RecentIds>,
}

impl Default for CommentCounters {
    fn default() -> Self {
        Self::with_dedup_window(DEFAULT_DEDUP_WINDOW)
    }
}

impl CommentCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup_window(capacity: usize) -> Self {
        Self {
            threads: DashMap::new(),
            replies: DashMap::new(),
            seen: Mutex::new(RecentIds::new(capacity)),
        }
    }

    /// `None` until the thread has been seeded.
    pub fn thread_count(&self, thread_id: i64) -> Option<i64> {
        self.threads.get(&thread_id).map(|n| *n)
    }

    /// `None` until the parent has been seeded.
    pub fn reply_count(&self, parent_id: Uuid) -> Option<i64> {
        self.replies.get(&parent_id).map(|n| *n)
    }

    /// Seeds a thread count, e.g. from `count_in_thread`.
    pub fn reset_thread(&self, thread_id: i64, count: i64) {
        self.threads.insert(thread_id, count.max(0));
    }

    /// Seeds a reply count, e.g. from `count_under_parent`.
    pub fn reset_replies(&self, parent_id: Uuid, count: i64) {
        self.replies.insert(parent_id, count.max(0));
    }

    fn apply(&self, event: &DomainEvent) -> anyhow::Result<()> {
        match &event.payload {
            CommentEvent::Created(data) => {
                adjust(&self.threads, data.thread_id, 1);
                if let Some(parent_id) = data.parent_id {
                    adjust(&self.replies, parent_id, 1);
                }
            }
            CommentEvent::Updated(_) => {}
            CommentEvent::Deleted(data) => {
                adjust(&self.threads, data.thread_id, -1);
                if let Some(parent_id) = data.parent_id {
                    adjust(&self.replies, parent_id, -1);
                }
                let id: Uuid = event.aggregate_id.parse()?;
                self.replies.remove(&id);
            }
        }
        Ok(())
    }

    fn first_delivery(&self, event_id: Uuid) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_id)
    }
}

/// Moves a seeded count; unseeded keys stay absent. Never below zero.
fn adjust<K: std::hash::Hash + Eq>(map: &DashMap<K, i64>, key: K, delta: i64) {
    if let Some(mut n) = map.get_mut(&key) {
        *n = (*n + delta).max(0);
    }
}

/// Fixed-capacity set of the most recently inserted ids. The oldest id is
/// forgotten when a new one would exceed the capacity.
struct RecentIds {
    capacity: usize,
    order: VecDeque<Uuid>,
    ids: HashSet<Uuid>,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    /// `false` when `id` is already in the window.
    fn insert(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

#[async_trait]
impl EventHandler for CommentCounters {
    async fn handle(&self, event: DomainEvent) -> anyhow::Result<()> {
        if !self.first_delivery(event.event_id) {
            warn!(event_id = %event.event_id, "duplicate comment event ignored");
            return Ok(());
        }
        self.apply(&event)?;
        debug!(
            event_id = %event.event_id,
            kind = ?event.kind(),
            thread_id = event.payload.thread_id(),
            "comment counters updated"
        );
        Ok(())
    }
}
