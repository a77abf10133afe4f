//! # Domain Models
//!
//! These structs represent the comment tree of Reply-Board.
//! Comment IDs are UUID v7 so that id order follows creation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted comment body, counted in code points.
pub const MAX_CONTENT_CHARS: usize = 255;

/// Depth of a comment that starts a conversation.
pub const ROOT_DEPTH: u8 = 0;

/// Depth of a reply. Nothing may be nested below this level.
pub const REPLY_DEPTH: u8 = 1;

/// A single persisted comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    /// The post/board item this comment belongs to
    pub thread_id: i64,
    pub author_id: i64,
    pub content: String,
    /// `None` for root comments
    pub parent_id: Option<Uuid>,
    /// 0 for roots, 1 for replies. Written once at creation.
    pub depth: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Replies sit at the bottom of the tree and cannot be answered.
    pub fn accepts_replies(&self) -> bool {
        self.depth == ROOT_DEPTH
    }

    /// Returns a copy carrying new content and modification time.
    /// Identity, thread, parent and depth are carried over untouched.
    pub fn with_content(&self, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            updated_at: now,
            ..self.clone()
        }
    }
}

/// A validated comment that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub thread_id: i64,
    pub author_id: i64,
    pub content: String,
    pub parent_id: Option<Uuid>,
    pub depth: u8,
}

impl NewComment {
    /// Depth is derived from the presence of a parent and never supplied by callers.
    pub fn new(thread_id: i64, author_id: i64, content: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self {
            thread_id,
            author_id,
            content: content.into(),
            parent_id,
            depth: if parent_id.is_some() { REPLY_DEPTH } else { ROOT_DEPTH },
        }
    }

    /// Materializes the persisted form. Used by store adapters.
    pub fn into_comment(self, id: Uuid, now: DateTime<Utc>) -> Comment {
        Comment {
            id,
            thread_id: self.thread_id,
            author_id: self.author_id,
            content: self.content,
            parent_id: self.parent_id,
            depth: self.depth,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A root comment with its full reply list, as returned by hierarchical listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub children: Vec<Comment>,
}
