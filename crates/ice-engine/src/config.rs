//! Per-run engine configuration.

use serde::{Deserialize, Serialize};

/// How the engine reacts when a node in the active level fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop dispatching further levels as soon as any node in the current
    /// level fails; nodes already dispatched in that level still settle.
    #[default]
    Halt,
    /// Run every level regardless of prior failures; dependents of a
    /// failed node are skipped, unrelated branches still run.
    ContinuePossible,
    /// Run every level unconditionally, including dependents of failed
    /// nodes (their inputs simply resolve as missing).
    Always,
}

/// Resource and concurrency limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum nodes dispatched concurrently within a level.
    pub max_parallel: usize,
    /// What to do when a node fails.
    pub failure_policy: FailurePolicy,
    /// Maximum number of scheduling levels a run may execute before the
    /// engine aborts it. `None` means unbounded.
    pub depth_ceiling: Option<u32>,
    /// Token budget for the whole run. `None` means unbounded.
    pub max_tokens: Option<u64>,
    /// Cost budget for the whole run, USD. `None` means unbounded.
    pub org_budget_usd: Option<f64>,
    /// Minimum wall-clock gap, in seconds, between two context-snapshot
    /// checkpoints published to the event bus. `None` disables
    /// checkpointing entirely.
    pub checkpoint_interval_seconds: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel: 8,
            failure_policy: FailurePolicy::default(),
            depth_ceiling: Some(10),
            max_tokens: None,
            org_budget_usd: None,
            checkpoint_interval_seconds: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_halts_and_bounds_depth() {
        let config = EngineConfig::default();
        assert_eq!(config.failure_policy, FailurePolicy::Halt);
        assert_eq!(config.depth_ceiling, Some(10));
    }
}
