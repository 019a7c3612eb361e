//! `ActionResult<T>`: the rich outcome shape a node-kind executor can
//! produce, generalized from a single "run one action" outcome to the
//! twelve node kinds' distinct control-flow shapes (branch, loop
//! continue/break, parallel multi-output, human/monitor pause).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The outcome of running one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionResult<T> {
    /// A plain successful result.
    Success(T),
    /// The node opted not to produce output (e.g. a condition branch not
    /// taken is never scheduled, but a kind may still choose to skip).
    Skip,
    /// A `loop` body iteration should continue to the next item.
    Continue,
    /// A `loop` body iteration should stop early.
    Break,
    /// A `condition` node's decision.
    Branch {
        /// Whether the true branch was taken.
        taken: bool,
    },
    /// A `workflow`/`recursive` node redirecting to another target.
    Route {
        /// The target node or workflow name.
        target: String,
    },
    /// A `parallel` node's per-branch results.
    MultiOutput(Vec<T>),
    /// An executor suspended without resolving to a value. `human` nodes
    /// resolve this internally by awaiting a response instead of
    /// returning it, but the variant stays part of the public shape for
    /// executors that want to report a wait without blocking the caller.
    Wait {
        /// Human-readable reason for the wait.
        reason: String,
    },
}

impl<T> ActionResult<T> {
    /// The primary JSON-shaped output committed to `NodeExecutionResult`,
    /// exhaustively covering every variant so a new one is a compile
    /// error here until handled.
    pub fn primary_output(self) -> Value
    where
        T: Serialize,
    {
        match self {
            ActionResult::Success(value) => serde_json::to_value(value).unwrap_or(Value::Null),
            ActionResult::Skip => Value::Null,
            ActionResult::Continue => serde_json::json!({"control": "continue"}),
            ActionResult::Break => serde_json::json!({"control": "break"}),
            ActionResult::Branch { taken } => serde_json::json!({"result": taken}),
            ActionResult::Route { target } => serde_json::json!({"route": target}),
            ActionResult::MultiOutput(values) => {
                serde_json::to_value(values).unwrap_or(Value::Null)
            }
            ActionResult::Wait { reason } => serde_json::json!({"wait": reason}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_primary_output_carries_the_decision() {
        let result: ActionResult<Value> = ActionResult::Branch { taken: true };
        assert_eq!(result.primary_output(), serde_json::json!({"result": true}));
    }

    #[test]
    fn success_primary_output_passes_through() {
        let result = ActionResult::Success(serde_json::json!({"x": 1}));
        assert_eq!(result.primary_output(), serde_json::json!({"x": 1}));
    }
}
