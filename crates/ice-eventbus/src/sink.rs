//! Durable event sinks. The bus fans events out to subscribers in-process
//! (see [`crate::bus::EventBus`]); a sink additionally persists them so a
//! client that connects after the fact (or a different process) can replay
//! a run's history.

use async_trait::async_trait;

use crate::event::ExecutionEvent;
use crate::error::EventBusError;

/// Persists execution events for later replay.
#[async_trait]
pub trait RunEventSink: Send + Sync {
    /// Append one event to the run's event log.
    async fn append(&self, event: &ExecutionEvent) -> Result<(), EventBusError>;

    /// Fetch every event recorded for `run_id`, in emission order.
    async fn history(&self, run_id: &str) -> Result<Vec<ExecutionEvent>, EventBusError>;
}

/// An in-memory sink, useful for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: dashmap::DashMap<String, Vec<ExecutionEvent>>,
}

impl InMemoryEventSink {
    /// Build an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunEventSink for InMemoryEventSink {
    async fn append(&self, event: &ExecutionEvent) -> Result<(), EventBusError> {
        self.events
            .entry(event.run_id().to_owned())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn history(&self, run_id: &str) -> Result<Vec<ExecutionEvent>, EventBusError> {
        Ok(self
            .events
            .get(run_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

/// A sink that appends to a Redis stream named `run:{run_id}:events`,
/// mirroring the fanout a dashboard or a reconnecting WebSocket client
/// replays from.
#[cfg(feature = "redis")]
#[derive(Debug, Clone)]
pub struct RedisEventSink {
    client: redis::Client,
    /// Stream entries older than this are eligible for trimming on append.
    pub max_stream_len: usize,
}

#[cfg(feature = "redis")]
impl RedisEventSink {
    /// Build a sink against a Redis connection string (`redis://...`).
    pub fn new(redis_url: &str, max_stream_len: usize) -> Result<Self, EventBusError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| EventBusError::Backend(err.to_string()))?;
        Ok(Self {
            client,
            max_stream_len,
        })
    }

    fn stream_key(run_id: &str) -> String {
        format!("run:{run_id}:events")
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl RunEventSink for RedisEventSink {
    async fn append(&self, event: &ExecutionEvent) -> Result<(), EventBusError> {
        use redis::AsyncCommands;

        let payload = serde_json::to_string(event)
            .map_err(|err| EventBusError::Serialization(err.to_string()))?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| EventBusError::Backend(err.to_string()))?;
        let key = Self::stream_key(event.run_id());
        let _: String = conn
            .xadd_maxlen(
                &key,
                redis::streams::StreamMaxlen::Approx(self.max_stream_len),
                "*",
                &[("payload", payload)],
            )
            .await
            .map_err(|err| EventBusError::Backend(err.to_string()))?;
        Ok(())
    }

    async fn history(&self, run_id: &str) -> Result<Vec<ExecutionEvent>, EventBusError> {
        use redis::AsyncCommands;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| EventBusError::Backend(err.to_string()))?;
        let key = Self::stream_key(run_id);
        let entries: Vec<(String, Vec<(String, String)>)> = conn
            .xrange_all(&key)
            .await
            .map_err(|err| EventBusError::Backend(err.to_string()))?;
        entries
            .into_iter()
            .filter_map(|(_id, fields)| {
                fields
                    .into_iter()
                    .find(|(field, _)| field == "payload")
                    .map(|(_, payload)| payload)
            })
            .map(|payload| {
                serde_json::from_str(&payload)
                    .map_err(|err| EventBusError::Serialization(err.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(run_id: &str) -> ExecutionEvent {
        ExecutionEvent::NodeStarted {
            run_id: run_id.to_owned(),
            node_id: "n1".into(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_sink_replays_in_order() {
        let sink = InMemoryEventSink::new();
        sink.append(&sample_event("run-1")).await.unwrap();
        sink.append(&ExecutionEvent::NodeCompleted {
            run_id: "run-1".into(),
            node_id: "n1".into(),
            duration_seconds: 0.5,
            output_preview: serde_json::json!({}),
            timestamp: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let history = sink.history("run-1").await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn in_memory_sink_isolates_runs() {
        let sink = InMemoryEventSink::new();
        sink.append(&sample_event("run-a")).await.unwrap();
        assert!(sink.history("run-b").await.unwrap().is_empty());
    }
}
