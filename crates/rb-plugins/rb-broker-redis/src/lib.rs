//! # rb-broker-redis
//!
//! Redis implementation of `EventTransport`. Each event is PUBLISHed as JSON
//! on the channel `<exchange>:<routing_key>`, so subscribers can use
//! `PSUBSCRIBE comment.exchange:comment.*` for topic-style fan-out.
//!
//! Redis pub/sub keeps nothing for absent subscribers; durability, when
//! needed, is configured on the consumer side.

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};
use rb_core::events::DomainEvent;
use rb_core::traits::EventTransport;
use tracing::debug;

pub struct RedisBroker {
    pool: Pool,
}

impl RedisBroker {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = Config::from_url(url).create_pool(Some(Runtime::Tokio1))?;
        Ok(Self::new(pool))
    }
}

/// Channel name an event is published on.
pub fn channel_name(exchange: &str, routing_key: &str) -> String {
    format!("{exchange}:{routing_key}")
}

#[async_trait]
impl EventTransport for RedisBroker {
    async fn publish(&self, exchange: &str, routing_key: &str, event: &DomainEvent) -> anyhow::Result<()> {
        let payload = event.to_json()?;
        let channel = channel_name(exchange, routing_key);

        let mut conn = self.pool.get().await?;
        let receivers: i64 = conn.publish(&channel, payload).await?;
        debug!(channel = %channel, receivers, "event published to redis");
        Ok(())
    }
}
