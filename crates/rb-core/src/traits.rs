//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::events::DomainEvent;
use crate::models::{Comment, NewComment};
use crate::search::CommentFilter;

/// Data persistence contract for comments.
///
/// Every list is ordered by `created_at` ascending, ties broken by id.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Persists a validated comment and returns its newly assigned id.
    async fn insert(&self, comment: NewComment) -> anyhow::Result<Uuid>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Comment>>;

    // Listing
    /// Comments of a thread passing `filter`, roots and replies alike, plus the
    /// number of rows that pass it.
    async fn list_by_thread(
        &self,
        thread_id: i64,
        filter: &CommentFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Comment>, i64)>;
    /// Depth-0 comments of a thread, plus the number of roots in the thread.
    async fn list_roots_by_thread(&self, thread_id: i64, limit: i64, offset: i64) -> anyhow::Result<(Vec<Comment>, i64)>;
    /// Every reply under `parent_id`. Not paginated.
    async fn list_children(&self, parent_id: Uuid) -> anyhow::Result<Vec<Comment>>;

    // Counting
    async fn count_by_thread(&self, thread_id: i64) -> anyhow::Result<i64>;
    async fn count_by_parent(&self, parent_id: Uuid) -> anyhow::Result<i64>;
    async fn has_children(&self, parent_id: Uuid) -> anyhow::Result<bool>;

    // Mutation
    /// Overwrites content and `updated_at`. Returns `false` if the id does not exist.
    async fn update(&self, comment: &Comment) -> anyhow::Result<bool>;
    /// Hard delete. Returns `false` if nothing was removed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Bulk hard delete of every reply under `parent_id`; returns the removed rows.
    async fn delete_children_of(&self, parent_id: Uuid) -> anyhow::Result<Vec<Comment>>;
    /// Hard delete of a whole thread, replies before roots; returns the removed rows.
    async fn delete_by_thread(&self, thread_id: i64) -> anyhow::Result<Vec<Comment>>;
}

/// Topic-routed publish contract for the message transport.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn publish(&self, exchange: &str, routing_key: &str, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Subscriber contract for consumers of comment events.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: DomainEvent) -> anyhow::Result<()>;
}
