//! Pending external responses for in-flight `human` nodes, keyed by
//! `(run_id, node_id)`.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

/// A table of oneshot response channels for `human` nodes currently
/// suspended awaiting an external decision.
#[derive(Clone, Default)]
pub struct HumanResponseRegistry {
    pending: Arc<DashMap<(String, String), oneshot::Sender<Value>>>,
}

impl HumanResponseRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node about to suspend, returning the receiver it should
    /// await.
    pub fn register(&self, run_id: &str, node_id: &str) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert((run_id.to_owned(), node_id.to_owned()), tx);
        rx
    }

    /// Deliver a response to a waiting node. Returns `false` if no node is
    /// registered under this key (already responded to, timed out, or
    /// never suspended).
    pub fn respond(&self, run_id: &str, node_id: &str, value: Value) -> bool {
        self.pending
            .remove(&(run_id.to_owned(), node_id.to_owned()))
            .is_some_and(|(_, tx)| tx.send(value).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn respond_delivers_value_to_registered_receiver() {
        let registry = HumanResponseRegistry::new();
        let rx = registry.register("run-1", "approve");
        assert!(registry.respond("run-1", "approve", serde_json::json!({"approved": true})));
        let value = rx.await.unwrap();
        assert_eq!(value, serde_json::json!({"approved": true}));
    }

    #[test]
    fn respond_to_unknown_key_returns_false() {
        let registry = HumanResponseRegistry::new();
        assert!(!registry.respond("run-1", "missing", serde_json::json!(null)));
    }
}
