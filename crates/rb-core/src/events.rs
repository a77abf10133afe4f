//! # Domain Events
//!
//! Immutable facts about comment changes, published for consumers outside
//! the write path (counters, notifications). The payload variant is the
//! event type; there is no separate type field to keep in sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Comment, NewComment};

/// Current envelope schema version.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// The exchange every comment event is addressed to.
pub const COMMENT_EXCHANGE: &str = "comment.exchange";

pub const COMMENT_CREATED_ROUTING_KEY: &str = "comment.created";
pub const COMMENT_UPDATED_ROUTING_KEY: &str = "comment.updated";
pub const COMMENT_DELETED_ROUTING_KEY: &str = "comment.deleted";

pub const COMMENT_CREATED_QUEUE: &str = "comment.created.queue";
pub const COMMENT_UPDATED_QUEUE: &str = "comment.updated.queue";
pub const COMMENT_DELETED_QUEUE: &str = "comment.deleted.queue";
pub const NOTIFICATION_QUEUE: &str = "notification.queue";

/// Binding key for consumers interested in every comment event.
pub const ALL_COMMENT_EVENTS: &str = "comment.*";

/// Queue name and binding key pairs declared on [`COMMENT_EXCHANGE`].
pub const COMMENT_TOPOLOGY: [(&str, &str); 4] = [
    (COMMENT_CREATED_QUEUE, COMMENT_CREATED_ROUTING_KEY),
    (COMMENT_UPDATED_QUEUE, COMMENT_UPDATED_ROUTING_KEY),
    (COMMENT_DELETED_QUEUE, COMMENT_DELETED_ROUTING_KEY),
    (NOTIFICATION_QUEUE, ALL_COMMENT_EVENTS),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn routing_key(self) -> &'static str {
        match self {
            Self::Created => COMMENT_CREATED_ROUTING_KEY,
            Self::Updated => COMMENT_UPDATED_ROUTING_KEY,
            Self::Deleted => COMMENT_DELETED_ROUTING_KEY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCreated {
    pub thread_id: i64,
    pub content: String,
    pub author_id: i64,
    pub parent_id: Option<Uuid>,
    pub depth: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentUpdated {
    pub thread_id: i64,
    pub old_content: String,
    pub new_content: String,
    pub author_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDeleted {
    pub thread_id: i64,
    pub content: String,
    pub author_id: i64,
    pub parent_id: Option<Uuid>,
    pub had_children: bool,
}

/// Type-specific event data. The tag doubles as the event type on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentEvent {
    Created(CommentCreated),
    Updated(CommentUpdated),
    Deleted(CommentDeleted),
}

impl CommentEvent {
    pub fn created(comment: &NewComment) -> Self {
        Self::Created(CommentCreated {
            thread_id: comment.thread_id,
            content: comment.content.clone(),
            author_id: comment.author_id,
            parent_id: comment.parent_id,
            depth: comment.depth,
        })
    }

    pub fn updated(before: &Comment, after: &Comment) -> Self {
        Self::Updated(CommentUpdated {
            thread_id: after.thread_id,
            old_content: before.content.clone(),
            new_content: after.content.clone(),
            author_id: after.author_id,
        })
    }

    pub fn deleted(comment: &Comment, had_children: bool) -> Self {
        Self::Deleted(CommentDeleted {
            thread_id: comment.thread_id,
            content: comment.content.clone(),
            author_id: comment.author_id,
            parent_id: comment.parent_id,
            had_children,
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => EventKind::Created,
            Self::Updated(_) => EventKind::Updated,
            Self::Deleted(_) => EventKind::Deleted,
        }
    }

    pub fn thread_id(&self) -> i64 {
        match self {
            Self::Created(data) => data.thread_id,
            Self::Updated(data) => data.thread_id,
            Self::Deleted(data) => data.thread_id,
        }
    }
}

/// The envelope handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub version: u32,
    pub occurred_at: DateTime<Utc>,
    /// The comment id, stringified
    pub aggregate_id: String,
    pub payload: CommentEvent,
}

impl DomainEvent {
    /// Stamps a fresh event id and occurrence time onto `payload`.
    pub fn new(aggregate_id: Uuid, payload: CommentEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            version: EVENT_SCHEMA_VERSION,
            occurred_at: Utc::now(),
            aggregate_id: aggregate_id.to_string(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn routing_key(&self) -> &'static str {
        self.kind().routing_key()
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
