//! # AppError
//!
//! Centralized error handling for the Reply-Board ecosystem.
//! Every domain failure is detected before the store is mutated.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all comment operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Validation failure (e.g., empty content, missing author)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Resource not found (e.g., Comment, parent Comment)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Attempt to reply to a comment that is already a reply
    #[error("cannot reply to a reply: comment {0} is already at maximum depth")]
    InvalidDepth(Uuid),

    /// Parent lives in another thread than the reply being created
    #[error("parent comment {parent_id} belongs to thread {parent_thread}, not {thread_id}")]
    CrossThreadReply {
        parent_id: Uuid,
        parent_thread: i64,
        thread_id: i64,
    },

    /// Delete attempted while replies still exist
    #[error("a comment with replies cannot be removed: {0}")]
    HasChildren(Uuid),

    /// Infrastructure failure (e.g., DB down, connection reset)
    #[error("internal service error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn comment_not_found(id: Uuid) -> Self {
        Self::NotFound("Comment".to_string(), id.to_string())
    }
}

/// A specialized Result type for Reply-Board logic.
pub type Result<T> = std::result::Result<T, AppError>;
