//! Logs every event it consumes. Bound to the per-type queues so each
//! kind of comment change leaves a trace in the service log.

use async_trait::async_trait;
use rb_core::events::{CommentEvent, DomainEvent};
use rb_core::traits::EventHandler;
use tracing::info;

pub struct EventLog {
    queue: String,
}

impl EventLog {
    pub fn new(queue: impl Into<String>) -> Self {
        Self { queue: queue.into() }
    }
}

#[async_trait]
impl EventHandler for EventLog {
    async fn handle(&self, event: DomainEvent) -> anyhow::Result<()> {
        let thread_id = event.payload.thread_id();
        match &event.payload {
            CommentEvent::Created(data) => info!(
                queue = %self.queue,
                event_id = %event.event_id,
                comment_id = %event.aggregate_id,
                thread_id,
                depth = data.depth,
                "comment created event received"
            ),
            CommentEvent::Updated(data) => info!(
                queue = %self.queue,
                event_id = %event.event_id,
                comment_id = %event.aggregate_id,
                thread_id,
                author_id = data.author_id,
                "comment updated event received"
            ),
            CommentEvent::Deleted(data) => info!(
                queue = %self.queue,
                event_id = %event.event_id,
                comment_id = %event.aggregate_id,
                thread_id,
                had_children = data.had_children,
                "comment deleted event received"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_core::models::NewComment;
    use uuid::Uuid;

    #[tokio::test]
    async fn never_fails() {
        let log = EventLog::new("comment.created.queue");
        let event = DomainEvent::new(Uuid::now_v7(), CommentEvent::created(&NewComment::new(1, 1, "x", None)));
        assert!(log.handle(event).await.is_ok());
    }
}
