//! # Reply-Board Binary
//!
//! The entry point that assembles the application based on compile-time features.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use rb_api::{configure_routes, middleware, AppState};
use rb_broker_local::LocalBroker;
use rb_config::{AppConfig, LogConfig, TransportKind};
use rb_core::events::{ALL_COMMENT_EVENTS, COMMENT_TOPOLOGY, NOTIFICATION_QUEUE};
use rb_core::traits::{CommentStore, EventTransport};
use rb_services::{CommentCounters, EventLog, EventPublisher, ThreadingEngine};
use secrecy::ExposeSecret;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Feature-gated imports: the store and transport are chosen at compile time.
#[cfg(feature = "db-sqlite")]
use rb_db_sqlite::SqliteCommentStore;

#[cfg(all(feature = "db-memory", not(feature = "db-sqlite")))]
use rb_db_memory::MemoryCommentStore;

#[cfg(feature = "redis")]
use rb_broker_redis::RedisBroker;

#[cfg(not(any(feature = "db-sqlite", feature = "db-memory")))]
compile_error!("enable one of the `db-sqlite` or `db-memory` features");

/// How long shutdown waits for queued events to reach the transport.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.log);

    // 1. Initialize the comment store
    let store = build_store(&config).await?;

    // 2. Initialize the event transport and its consumers
    let (transport, counters) = build_transport(&config)?;

    // 3. Wire the engine to its publisher
    let (events, worker) = EventPublisher::spawn(transport, config.events.exchange.clone(), config.events.queue_capacity);
    let engine = Arc::new(ThreadingEngine::new(store, events));
    let state = web::Data::new(AppState { engine, counters });

    let (host, port) = config.bind_address();
    info!(%host, port, "Reply-Board starting");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::access_log())
            .wrap(middleware::cors_policy())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    // Every engine handle is gone with the server; let the worker drain.
    if tokio::time::timeout(DRAIN_TIMEOUT, worker.join()).await.is_err() {
        warn!("publish queue not drained before shutdown; pending events dropped");
    }
    info!("Reply-Board stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[cfg(feature = "db-sqlite")]
async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CommentStore>> {
    let store = SqliteCommentStore::connect(config.database.url.expose_secret(), config.database.max_connections)
        .await
        .context("opening the comment database")?;
    Ok(Arc::new(store))
}

#[cfg(all(feature = "db-memory", not(feature = "db-sqlite")))]
async fn build_store(_config: &AppConfig) -> anyhow::Result<Arc<dyn CommentStore>> {
    warn!("using the in-memory comment store; comments are lost on restart");
    Ok(Arc::new(MemoryCommentStore::new()))
}

/// Counters are only returned when an in-process consumer keeps them fed.
fn build_transport(config: &AppConfig) -> anyhow::Result<(Arc<dyn EventTransport>, Option<Arc<CommentCounters>>)> {
    match config.events.transport {
        TransportKind::Local => {
            let counters = Arc::new(CommentCounters::new());
            let broker = local_broker(&config.events.exchange, counters.clone());
            Ok((Arc::new(broker), Some(counters)))
        }
        TransportKind::Redis => Ok((redis_transport(config)?, None)),
    }
}

/// Declares the comment topology on an in-process broker and starts its consumers.
fn local_broker(exchange: &str, counters: Arc<CommentCounters>) -> LocalBroker {
    let broker = LocalBroker::new();
    for (queue, binding_key) in COMMENT_TOPOLOGY {
        if queue == NOTIFICATION_QUEUE {
            continue;
        }
        broker.subscribe(exchange, queue, binding_key, Arc::new(EventLog::new(queue)));
    }
    broker.subscribe(
        exchange,
        NOTIFICATION_QUEUE,
        ALL_COMMENT_EVENTS,
        counters,
    );
    broker
}

#[cfg(feature = "redis")]
fn redis_transport(config: &AppConfig) -> anyhow::Result<Arc<dyn EventTransport>> {
    let url = config
        .events
        .redis_url
        .as_ref()
        .context("events.redis_url is not set")?;
    let broker = RedisBroker::connect(url.expose_secret()).context("creating the redis pool")?;
    Ok(Arc::new(broker))
}

#[cfg(not(feature = "redis"))]
fn redis_transport(_config: &AppConfig) -> anyhow::Result<Arc<dyn EventTransport>> {
    anyhow::bail!("events.transport = \"redis\" requires building with the `redis` feature")
}
