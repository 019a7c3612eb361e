//! Engine-level errors: graph validity and budget/depth guard violations.
//! Per-node failures never surface here — they're recorded on the
//! [`crate::run::RunSummary`] instead, per the engine's failure policy.

use thiserror::Error;

/// Errors raised before or during a run that stop the engine outright,
/// as opposed to a single node failing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The blueprint's dependency graph contains a cycle.
    #[error("blueprint contains a dependency cycle")]
    CyclicGraph,
    /// The run's configured token budget was exceeded.
    #[error("token budget of {budget} exceeded: consumed {consumed}")]
    TokenBudgetExceeded {
        /// The configured ceiling.
        budget: u64,
        /// Tokens consumed when the guard tripped.
        consumed: u64,
    },
    /// The run's configured cost budget was exceeded.
    #[error("cost budget of ${budget_usd:.2} exceeded: spent ${spent_usd:.2}")]
    CostBudgetExceeded {
        /// The configured ceiling, USD.
        budget_usd: f64,
        /// Spend when the guard tripped, USD.
        spent_usd: f64,
    },
    /// A `recursive` or nested `workflow` chain exceeded the configured
    /// recursion depth ceiling.
    #[error("recursion depth ceiling of {0} exceeded")]
    DepthCeilingExceeded(u32),
    /// The run was cancelled before it could complete.
    #[error("run was cancelled")]
    Cancelled,
    /// The event bus failed to publish or persist an event.
    #[error("event bus error: {0}")]
    EventBus(#[from] ice_eventbus::EventBusError),
}
