//! The in-process fanout half of the event bus, generalized from the
//! teacher's `tokio::sync::broadcast`-backed `EventBus`.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::EventBusError;
use crate::event::ExecutionEvent;
use crate::sink::RunEventSink;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Publishes execution events to live subscribers and, if configured, a
/// durable sink for replay.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
    sink: Option<Arc<dyn RunEventSink>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Build a bus with no durable sink — subscribers only see events
    /// published while they're connected.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { sender, sink: None }
    }

    /// Build a bus that also persists every event to `sink`.
    #[must_use]
    pub fn with_sink(sink: Arc<dyn RunEventSink>) -> Self {
        let (sender, _receiver) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            sender,
            sink: Some(sink),
        }
    }

    /// Publish an event to all live subscribers and, if present, the sink.
    ///
    /// A publish with no subscribers is not an error: `send` only fails
    /// when the channel has zero receivers, which is the common case
    /// between a run starting and a client connecting to watch it.
    pub async fn publish(&self, event: ExecutionEvent) -> Result<(), EventBusError> {
        if let Some(sink) = &self.sink {
            sink.append(&event).await?;
        }
        let _ = self.sender.send(event);
        Ok(())
    }

    /// Subscribe to the live event stream.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of currently live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// The durable sink backing this bus, if one was configured. Callers
    /// replaying history (e.g. an SSE stream honoring `Last-Event-ID`) read
    /// from this before subscribing to the live stream.
    #[must_use]
    pub fn sink(&self) -> Option<&Arc<dyn RunEventSink>> {
        self.sink.as_ref()
    }
}

/// A live handle receiving events published after subscription.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<ExecutionEvent>,
}

impl EventSubscriber {
    /// Wait for the next event. Returns `Err(Lagged)` if this subscriber
    /// fell behind and the channel overwrote unread events.
    pub async fn recv(&mut self) -> Result<ExecutionEvent, EventBusError> {
        self.receiver.recv().await.map_err(|err| match err {
            broadcast::error::RecvError::Lagged(skipped) => EventBusError::Lagged(skipped),
            broadcast::error::RecvError::Closed => EventBusError::Backend("bus closed".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> ExecutionEvent {
        ExecutionEvent::NodeStarted {
            run_id: "r1".into(),
            node_id: "n1".into(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();
        bus.publish(sample_event()).await.unwrap();
        let received = subscriber.recv().await.unwrap();
        assert_eq!(received.run_id(), "r1");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = EventBus::new();
        bus.publish(sample_event()).await.unwrap();
    }

    #[tokio::test]
    async fn sink_receives_every_published_event() {
        let sink = Arc::new(crate::sink::InMemoryEventSink::new());
        let bus = EventBus::with_sink(sink.clone());
        bus.publish(sample_event()).await.unwrap();
        assert_eq!(sink.history("r1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscriber_count_tracks_live_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        let _subscriber = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }
}
