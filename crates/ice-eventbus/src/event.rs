//! `ExecutionEvent`: the streamed event shape, generalized from the
//! teacher's 7-variant `ExecutionEvent` into the sixteen event types a run
//! can emit.

use serde::{Deserialize, Serialize};

/// One streamed execution event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A run began.
    WorkflowStarted {
        /// The run this event belongs to.
        run_id: String,
        /// Total node count in the plan.
        total_nodes: usize,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A run finished successfully.
    WorkflowCompleted {
        /// The run this event belongs to.
        run_id: String,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A run finished with a failure.
    WorkflowFailed {
        /// The run this event belongs to.
        run_id: String,
        /// Why the run failed.
        error: String,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A scheduling level began.
    LevelStarted {
        /// The run this event belongs to.
        run_id: String,
        /// The level number, 0-indexed.
        level: usize,
        /// Node ids dispatched at this level.
        node_ids: Vec<String>,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A scheduling level settled.
    LevelCompleted {
        /// The run this event belongs to.
        run_id: String,
        /// The level number, 0-indexed.
        level: usize,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A node was admitted to the active set and is about to dispatch.
    NodeQueued {
        /// The run this event belongs to.
        run_id: String,
        /// The node queued.
        node_id: String,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A node's task began running.
    NodeStarted {
        /// The run this event belongs to.
        run_id: String,
        /// The node started.
        node_id: String,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A node reported incremental progress.
    NodeProgress {
        /// The run this event belongs to.
        run_id: String,
        /// The node reporting progress.
        node_id: String,
        /// Free-form progress payload.
        detail: serde_json::Value,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A node finished successfully.
    NodeCompleted {
        /// The run this event belongs to.
        run_id: String,
        /// The node completed.
        node_id: String,
        /// Wall-clock duration, seconds.
        duration_seconds: f64,
        /// A size-bounded preview of the output.
        output_preview: serde_json::Value,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A node failed.
    NodeFailed {
        /// The run this event belongs to.
        run_id: String,
        /// The node that failed.
        node_id: String,
        /// The failure message.
        error: String,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A node was skipped because an upstream condition routed around it.
    NodeSkipped {
        /// The run this event belongs to.
        run_id: String,
        /// The node skipped.
        node_id: String,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A node is about to retry after a retryable failure.
    NodeRetrying {
        /// The run this event belongs to.
        run_id: String,
        /// The node retrying.
        node_id: String,
        /// The attempt number about to run.
        attempt: u32,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A token-usage update for the run.
    ResourceTokenUpdate {
        /// The run this event belongs to.
        run_id: String,
        /// Cumulative tokens consumed so far.
        total_tokens: u64,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A cost update for the run.
    ResourceCostUpdate {
        /// The run this event belongs to.
        run_id: String,
        /// Cumulative cost so far, USD.
        total_cost_usd: f64,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A debug snapshot of the current context, for the authoring UI.
    DebugContextSnapshot {
        /// The run this event belongs to.
        run_id: String,
        /// The snapshot payload.
        snapshot: serde_json::Value,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A validation error surfaced mid-run (e.g. from a dynamically
    /// resolved sub-workflow).
    DebugValidationError {
        /// The run this event belongs to.
        run_id: String,
        /// The error message.
        message: String,
        /// Emission timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ExecutionEvent {
    /// The run id every event variant carries.
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            ExecutionEvent::WorkflowStarted { run_id, .. }
            | ExecutionEvent::WorkflowCompleted { run_id, .. }
            | ExecutionEvent::WorkflowFailed { run_id, .. }
            | ExecutionEvent::LevelStarted { run_id, .. }
            | ExecutionEvent::LevelCompleted { run_id, .. }
            | ExecutionEvent::NodeQueued { run_id, .. }
            | ExecutionEvent::NodeStarted { run_id, .. }
            | ExecutionEvent::NodeProgress { run_id, .. }
            | ExecutionEvent::NodeCompleted { run_id, .. }
            | ExecutionEvent::NodeFailed { run_id, .. }
            | ExecutionEvent::NodeSkipped { run_id, .. }
            | ExecutionEvent::NodeRetrying { run_id, .. }
            | ExecutionEvent::ResourceTokenUpdate { run_id, .. }
            | ExecutionEvent::ResourceCostUpdate { run_id, .. }
            | ExecutionEvent::DebugContextSnapshot { run_id, .. }
            | ExecutionEvent::DebugValidationError { run_id, .. } => run_id,
        }
    }
}
