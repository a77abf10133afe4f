//! # rb-services
//!
//! Use-case layer: the threading engine that guards every comment write,
//! the event publisher it reports to, and an in-process event consumer.

pub mod counters;
pub mod event_log;
pub mod publisher;
pub mod threading;

pub use counters::CommentCounters;
pub use event_log::EventLog;
pub use publisher::{EventPublisher, PublishWorker};
pub use threading::ThreadingEngine;
