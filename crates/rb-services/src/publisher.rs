//! # EventPublisher
//!
//! Best-effort, at-most-once delivery of comment events. The write path
//! only enqueues; a background worker talks to the transport. Neither a
//! full queue nor a failing transport is ever reported back to the caller.

use std::sync::Arc;

use rb_core::events::{CommentEvent, DomainEvent};
use rb_core::traits::EventTransport;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Cheap handle held by the engine. Clones share the same worker.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<DomainEvent>,
}

/// The background task draining the publish queue.
pub struct PublishWorker {
    handle: JoinHandle<()>,
}

impl EventPublisher {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(
        transport: Arc<dyn EventTransport>,
        exchange: impl Into<String>,
        capacity: usize,
    ) -> (Self, PublishWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run(rx, transport, exchange.into()));
        (Self { tx }, PublishWorker { handle })
    }

    /// Wraps `payload` in a fresh envelope and enqueues it. Never blocks.
    pub fn publish(&self, aggregate_id: Uuid, payload: CommentEvent) {
        let event = DomainEvent::new(aggregate_id, payload);
        let event_id = event.event_id;
        let routing_key = event.routing_key();

        match self.tx.try_send(event) {
            Ok(()) => debug!(%event_id, %aggregate_id, routing_key, "comment event queued"),
            Err(TrySendError::Full(_)) => {
                warn!(%event_id, %aggregate_id, routing_key, "publish queue full; dropping comment event")
            }
            Err(TrySendError::Closed(_)) => {
                error!(%event_id, %aggregate_id, routing_key, "publish worker stopped; dropping comment event")
            }
        }
    }
}

impl PublishWorker {
    /// Waits until every publisher handle is dropped and the queue is drained.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            error!(error = %err, "publish worker terminated abnormally");
        }
    }
}

async fn run(mut rx: mpsc::Receiver<DomainEvent>, transport: Arc<dyn EventTransport>, exchange: String) {
    info!(exchange = %exchange, "comment event publisher started");
    while let Some(event) = rx.recv().await {
        deliver(transport.as_ref(), &exchange, &event).await;
    }
    info!(exchange = %exchange, "comment event publisher stopped");
}

/// Hands one envelope to the transport, logging and absorbing any failure.
pub async fn deliver(transport: &dyn EventTransport, exchange: &str, event: &DomainEvent) {
    let routing_key = event.routing_key();
    match transport.publish(exchange, routing_key, event).await {
        Ok(()) => info!(
            event_id = %event.event_id,
            aggregate_id = %event.aggregate_id,
            routing_key,
            "comment event published"
        ),
        Err(err) => error!(
            event_id = %event.event_id,
            aggregate_id = %event.aggregate_id,
            routing_key,
            error = %err,
            "comment event publish failed"
        ),
    }
}
