use thiserror::Error;

/// Errors raised by the event bus and its sinks.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// A subscriber lagged behind the broadcast channel and missed events.
    #[error("subscriber lagged and dropped {0} events")]
    Lagged(u64),
    /// The backing store (Redis, etc.) returned an error.
    #[error("event sink backend error: {0}")]
    Backend(String),
    /// An event failed to serialize or deserialize.
    #[error("event serialization error: {0}")]
    Serialization(String),
}
