//! # rb-db-memory
//!
//! Process-local implementation of `CommentStore`, backed by a `DashMap`.
//! Nothing survives a restart; used for development and tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rb_core::models::{Comment, NewComment};
use rb_core::search::CommentFilter;
use rb_core::traits::CommentStore;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryCommentStore {
    comments: DashMap<Uuid, Comment>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matching comments in creation order.
    fn collect(&self, keep: impl Fn(&Comment) -> bool) -> Vec<Comment> {
        let mut items: Vec<Comment> = self
            .comments
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items
    }

    /// Removes matching comments and hands them back in creation order.
    /// Rows inserted concurrently are either removed or left alone, never miscounted.
    fn remove_where(&self, doomed: impl Fn(&Comment) -> bool) -> Vec<Comment> {
        let mut removed = Vec::new();
        self.comments.retain(|_, c| {
            if doomed(c) {
                removed.push(c.clone());
                false
            } else {
                true
            }
        });
        removed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        removed
    }

    fn page(items: Vec<Comment>, limit: i64, offset: i64) -> (Vec<Comment>, i64) {
        let total = items.len() as i64;
        let page = items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        (page, total)
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn insert(&self, comment: NewComment) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        self.comments.insert(id, comment.into_comment(id, Utc::now()));
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        Ok(self.comments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_by_thread(
        &self,
        thread_id: i64,
        filter: &CommentFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Comment>, i64)> {
        Ok(Self::page(
            self.collect(|c| c.thread_id == thread_id && filter.matches(c)),
            limit,
            offset,
        ))
    }

    async fn list_roots_by_thread(&self, thread_id: i64, limit: i64, offset: i64) -> anyhow::Result<(Vec<Comment>, i64)> {
        Ok(Self::page(
            self.collect(|c| c.thread_id == thread_id && c.is_root()),
            limit,
            offset,
        ))
    }

    async fn list_children(&self, parent_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        Ok(self.collect(|c| c.parent_id == Some(parent_id)))
    }

    async fn count_by_thread(&self, thread_id: i64) -> anyhow::Result<i64> {
        Ok(self.comments.iter().filter(|e| e.thread_id == thread_id).count() as i64)
    }

    async fn count_by_parent(&self, parent_id: Uuid) -> anyhow::Result<i64> {
        Ok(self.comments.iter().filter(|e| e.parent_id == Some(parent_id)).count() as i64)
    }

    async fn has_children(&self, parent_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.comments.iter().any(|e| e.parent_id == Some(parent_id)))
    }

    async fn update(&self, comment: &Comment) -> anyhow::Result<bool> {
        match self.comments.get_mut(&comment.id) {
            Some(mut stored) => {
                stored.content = comment.content.clone();
                stored.updated_at = comment.updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.comments.remove(&id).is_some())
    }

    async fn delete_children_of(&self, parent_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        Ok(self.remove_where(|c| c.parent_id == Some(parent_id)))
    }

    async fn delete_by_thread(&self, thread_id: i64) -> anyhow::Result<Vec<Comment>> {
        let mut removed = self.remove_where(|c| c.thread_id == thread_id && !c.is_root());
        removed.extend(self.remove_where(|c| c.thread_id == thread_id && c.is_root()));
        Ok(removed)
    }
}
