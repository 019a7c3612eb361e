//! Run event bus: in-process fanout plus durable sinks for iceOS workflow
//! executions, and the lightweight metrics registry runs report through.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod error;
pub mod event;
pub mod metrics;
pub mod sink;

pub use bus::{EventBus, EventSubscriber};
pub use error::EventBusError;
pub use event::ExecutionEvent;
pub use metrics::{Counter, Gauge, Histogram, MetricsRegistry};
pub use sink::{InMemoryEventSink, RunEventSink};

#[cfg(feature = "redis")]
pub use sink::RedisEventSink;
