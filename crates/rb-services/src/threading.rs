//! # ThreadingEngine
//!
//! Gatekeeper for every comment write. All invariant checks run before the
//! store is touched, so a rejected request never leaves a partial write.
//!
//! The child check in [`ThreadingEngine::delete`] is read-then-act: a reply
//! created between the check and the delete is removed with its parent, and
//! gets its own DELETED event so event consumers stay in step with the store.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::try_join_all;
use rb_core::error::{AppError, Result};
use rb_core::events::CommentEvent;
use rb_core::models::{Comment, CommentNode, NewComment, MAX_CONTENT_CHARS};
use rb_core::pagination::{Page, PageRequest};
use rb_core::search::CommentFilter;
use rb_core::traits::CommentStore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::publisher::EventPublisher;

pub struct ThreadingEngine {
    store: Arc<dyn CommentStore>,
    events: EventPublisher,
}

impl ThreadingEngine {
    pub fn new(store: Arc<dyn CommentStore>, events: EventPublisher) -> Self {
        Self { store, events }
    }

    /// Creates a root comment, or a reply when `parent_id` is given.
    #[instrument(skip(self, content))]
    pub async fn create(
        &self,
        thread_id: i64,
        author_id: i64,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Uuid> {
        validate_content(content)?;
        validate_ids(thread_id, author_id)?;
        if let Some(parent_id) = parent_id {
            self.validate_parent(parent_id, thread_id).await?;
        }

        let new = NewComment::new(thread_id, author_id, content, parent_id);
        let payload = CommentEvent::created(&new);
        let depth = new.depth;
        let id = self.store.insert(new).await?;
        info!(comment_id = %id, depth, "comment created");

        self.events.publish(id, payload);
        Ok(id)
    }

    pub async fn read(&self, id: Uuid) -> Result<Comment> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::comment_not_found(id))
    }

    /// Replaces the content of an existing comment. Nothing else may change.
    #[instrument(skip(self, content))]
    pub async fn update(&self, id: Uuid, content: &str) -> Result<()> {
        let existing = self.read(id).await?;
        validate_content(content)?;

        let updated = existing.with_content(content, Utc::now());
        if !self.store.update(&updated).await? {
            // Removed between the read and the write.
            return Err(AppError::comment_not_found(id));
        }
        info!(comment_id = %id, "comment updated");

        self.events.publish(id, CommentEvent::updated(&existing, &updated));
        Ok(())
    }

    /// Hard-deletes a comment that has no replies. Never cascades.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let existing = self.read(id).await?;
        let had_children = self.store.has_children(id).await?;
        if had_children {
            return Err(AppError::HasChildren(id));
        }

        let event = CommentEvent::deleted(&existing, had_children);

        let stray = self.store.delete_children_of(id).await?;
        if !stray.is_empty() {
            warn!(comment_id = %id, stray = stray.len(), "removed replies created during delete");
        }
        for reply in &stray {
            self.events.publish(reply.id, CommentEvent::deleted(reply, false));
        }
        if !self.store.delete(id).await? {
            return Err(AppError::comment_not_found(id));
        }
        info!(comment_id = %id, "comment deleted");

        self.events.publish(id, event);
        Ok(())
    }

    /// Removes every comment of a thread, e.g. when the thread itself is
    /// deleted. Replies go first; one DELETED event per removed comment.
    /// Returns how many comments were removed.
    #[instrument(skip(self))]
    pub async fn purge_thread(&self, thread_id: i64) -> Result<usize> {
        if thread_id <= 0 {
            return Err(AppError::ValidationError("thread id is required".into()));
        }
        let removed = self.store.delete_by_thread(thread_id).await?;
        for comment in &removed {
            let had_children = removed.iter().any(|c| c.parent_id == Some(comment.id));
            self.events.publish(comment.id, CommentEvent::deleted(comment, had_children));
        }
        info!(thread_id, removed = removed.len(), "thread comments purged");
        Ok(removed.len())
    }

    /// Every comment of the thread on one time-ordered page, roots and replies mixed.
    pub async fn list_flat(&self, thread_id: i64, request: PageRequest) -> Result<Page<Comment>> {
        self.search_flat(thread_id, &CommentFilter::All, request).await
    }

    /// The flat listing narrowed by a keyword or depth filter. `total` and the
    /// page window count matching rows only.
    pub async fn search_flat(
        &self,
        thread_id: i64,
        filter: &CommentFilter,
        request: PageRequest,
    ) -> Result<Page<Comment>> {
        let (items, total) = self
            .store
            .list_by_thread(thread_id, filter, request.limit(), request.offset())
            .await?;
        debug!(thread_id, ?filter, total, returned = items.len(), "flat comment listing");
        Ok(Page::new(request, items, total))
    }

    /// Pages over root comments only; each root carries its complete reply list.
    pub async fn list_hierarchical(&self, thread_id: i64, request: PageRequest) -> Result<Page<CommentNode>> {
        let (roots, total) = self
            .store
            .list_roots_by_thread(thread_id, request.limit(), request.offset())
            .await?;

        let children = try_join_all(roots.iter().map(|root| self.store.list_children(root.id))).await?;

        let nodes: Vec<CommentNode> = roots
            .into_iter()
            .zip(children)
            .map(|(comment, children)| CommentNode { comment, children })
            .collect();
        debug!(thread_id, total, roots = nodes.len(), "hierarchical comment listing");
        Ok(Page::new(request, nodes, total))
    }

    pub async fn get_children(&self, parent_id: Uuid) -> Result<Vec<Comment>> {
        Ok(self.store.list_children(parent_id).await?)
    }

    pub async fn has_children(&self, parent_id: Uuid) -> Result<bool> {
        Ok(self.store.has_children(parent_id).await?)
    }

    pub async fn count_in_thread(&self, thread_id: i64) -> Result<i64> {
        Ok(self.store.count_by_thread(thread_id).await?)
    }

    pub async fn count_under_parent(&self, parent_id: Uuid) -> Result<i64> {
        Ok(self.store.count_by_parent(parent_id).await?)
    }

    async fn validate_parent(&self, parent_id: Uuid, thread_id: i64) -> Result<()> {
        let parent = self
            .store
            .get(parent_id)
            .await?
            .ok_or_else(|| AppError::comment_not_found(parent_id))?;

        if !parent.accepts_replies() {
            return Err(AppError::InvalidDepth(parent_id));
        }
        if parent.thread_id != thread_id {
            return Err(AppError::CrossThreadReply {
                parent_id,
                parent_thread: parent.thread_id,
                thread_id,
            });
        }
        Ok(())
    }
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AppError::ValidationError("comment content must not be empty".into()));
    }
    // Counted on the stored value; surrounding whitespace is kept and counts.
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::ValidationError(format!(
            "comment content must not exceed {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_ids(thread_id: i64, author_id: i64) -> Result<()> {
    if thread_id <= 0 {
        return Err(AppError::ValidationError("thread id is required".into()));
    }
    if author_id <= 0 {
        return Err(AppError::ValidationError("author id is required".into()));
    }
    Ok(())
}
