//! `RunStatus`/`RunSummary`: the record a run leaves behind once the
//! engine has finished dispatching every level it was going to dispatch.

use std::collections::BTreeMap;

use ice_core::{BlueprintId, CostMeta, NodeExecutionResult, RunId};
use serde::{Deserialize, Serialize};

/// Where a run landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every dispatched node succeeded (or was legitimately skipped).
    Completed,
    /// The run stopped early under [`crate::config::FailurePolicy::Halt`].
    Failed,
    /// A budget or depth guard tripped.
    Aborted,
    /// The run's cancellation token was triggered.
    Cancelled,
    /// A monitor node's `pause` trigger held further dispatch; nodes
    /// already committed in prior levels stand, no later level runs.
    Paused,
}

/// The full record of one run, returned once the engine settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// This run's id.
    pub run_id: RunId,
    /// The blueprint that was executed.
    pub blueprint_id: BlueprintId,
    /// Final status.
    pub status: RunStatus,
    /// Every dispatched node's result, keyed by node id.
    pub node_results: BTreeMap<String, NodeExecutionResult>,
    /// Node ids that were never dispatched because skip propagation or an
    /// early halt excluded them.
    pub skipped_node_ids: Vec<String>,
    /// Accumulated token/cost totals across every LLM call in the run.
    pub cost: CostMeta,
}

impl RunSummary {
    /// Whether every dispatched node in the summary succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.node_results.values().all(|result| result.success)
    }
}
