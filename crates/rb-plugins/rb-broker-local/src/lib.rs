//! # rb-broker-local
//!
//! In-process implementation of `EventTransport`: a topic exchange with
//! AMQP-style binding keys (`*` matches one word, `#` zero or more) and one
//! unbounded channel per queue. Events are JSON-encoded once per publish and
//! each matching queue receives exactly one copy.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use rb_core::events::DomainEvent;
use rb_core::traits::{EventHandler, EventTransport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A message as seen by a queue consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Bytes,
}

#[derive(Debug, Clone)]
struct Binding {
    queue: String,
    pattern: String,
}

#[derive(Default)]
pub struct LocalBroker {
    /// exchange name -> bindings declared on it
    bindings: DashMap<String, Vec<Binding>>,
    /// queue name -> sender half of its channel
    queues: DashMap<String, mpsc::UnboundedSender<Delivery>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `queue`, binds it to `exchange` with `binding_key` and returns
    /// its receiving end. Redeclaring a queue replaces its previous receiver.
    pub fn bind(&self, exchange: &str, queue: &str, binding_key: &str) -> mpsc::UnboundedReceiver<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queues.insert(queue.to_string(), tx);

        let mut bindings = self.bindings.entry(exchange.to_string()).or_default();
        if !bindings.iter().any(|b| b.queue == queue && b.pattern == binding_key) {
            bindings.push(Binding {
                queue: queue.to_string(),
                pattern: binding_key.to_string(),
            });
        }
        info!(exchange, queue, binding_key, "queue bound");
        rx
    }

    /// Binds a queue and drives `handler` with every event it receives.
    /// Handler failures are logged and the consumer keeps running.
    pub fn subscribe(
        &self,
        exchange: &str,
        queue: &str,
        binding_key: &str,
        handler: Arc<dyn EventHandler>,
    ) -> JoinHandle<()> {
        let mut rx = self.bind(exchange, queue, binding_key);
        let queue = queue.to_string();

        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                let event = match DomainEvent::from_json(&delivery.payload) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(queue = %queue, routing_key = %delivery.routing_key, error = %err, "undecodable event skipped");
                        continue;
                    }
                };
                let event_id = event.event_id;
                if let Err(err) = handler.handle(event).await {
                    error!(queue = %queue, %event_id, error = %err, "event handler failed");
                }
            }
            debug!(queue = %queue, "consumer stopped");
        })
    }

    fn matching_queues(&self, exchange: &str, routing_key: &str) -> BTreeSet<String> {
        self.bindings
            .get(exchange)
            .map(|bindings| {
                bindings
                    .iter()
                    .filter(|b| topic_matches(&b.pattern, routing_key))
                    .map(|b| b.queue.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventTransport for LocalBroker {
    async fn publish(&self, exchange: &str, routing_key: &str, event: &DomainEvent) -> anyhow::Result<()> {
        let payload = Bytes::from(event.to_json()?);
        let targets = self.matching_queues(exchange, routing_key);
        if targets.is_empty() {
            debug!(exchange, routing_key, "no queue bound; event discarded");
            return Ok(());
        }

        for queue in targets {
            let delivery = Delivery {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                payload: payload.clone(),
            };
            let closed = match self.queues.get(&queue) {
                Some(tx) => tx.send(delivery).is_err(),
                None => true,
            };
            if closed {
                warn!(queue = %queue, "queue has no consumer; dropping its bindings");
                self.queues.remove(&queue);
                if let Some(mut bindings) = self.bindings.get_mut(exchange) {
                    bindings.retain(|b| b.queue != queue);
                }
            }
        }
        Ok(())
    }
}

/// AMQP topic matching over dot-separated words.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.split_first(), key.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => match_words(rest, key) || (!key.is_empty() && match_words(pattern, &key[1..])),
        (Some((&"*", rest)), Some((_, key_rest))) => match_words(rest, key_rest),
        (Some((word, rest)), Some((head, key_rest))) if word == head => match_words(rest, key_rest),
        _ => false,
    }
}
