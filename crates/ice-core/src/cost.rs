//! Cost and token-usage bookkeeping shared by the engine, executors, and
//! event bus.
//!
//! Grounded on `workflow_state.py`'s `WorkflowExecutionState.total_tokens`/
//! `total_cost`/`api_calls` fields; modeled here as a concrete struct rather
//! than an opaque map so accumulation is type-checked.

use serde::{Deserialize, Serialize};

/// Aggregate cost and usage totals for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostMeta {
    /// Total tokens consumed across all LLM calls in the run.
    pub total_tokens: u64,
    /// Total estimated cost in USD.
    pub total_cost_usd: f64,
    /// Number of provider API calls made.
    pub api_calls: u64,
}

impl CostMeta {
    /// Fold a single node's usage into the running total.
    pub fn accumulate(&mut self, usage: &UsageMetadata) {
        self.total_tokens += usage.total_tokens();
        self.total_cost_usd += usage.cost_usd.unwrap_or(0.0);
        self.api_calls += 1;
    }
}

/// Token usage reported by an LLM provider for a single call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetadata {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens consumed by the completion.
    pub completion_tokens: u64,
    /// Estimated cost in USD, if the provider or pricing table reports one.
    pub cost_usd: Option<f64>,
}

impl UsageMetadata {
    /// Total tokens (prompt + completion).
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_sums_tokens_cost_and_calls() {
        let mut meta = CostMeta::default();
        meta.accumulate(&UsageMetadata {
            prompt_tokens: 10,
            completion_tokens: 5,
            cost_usd: Some(0.02),
        });
        meta.accumulate(&UsageMetadata {
            prompt_tokens: 3,
            completion_tokens: 1,
            cost_usd: None,
        });

        assert_eq!(meta.total_tokens, 19);
        assert!((meta.total_cost_usd - 0.02).abs() < f64::EPSILON);
        assert_eq!(meta.api_calls, 2);
    }

    #[test]
    fn usage_total_tokens_sums_prompt_and_completion() {
        let usage = UsageMetadata {
            prompt_tokens: 7,
            completion_tokens: 3,
            cost_usd: None,
        };
        assert_eq!(usage.total_tokens(), 10);
    }
}
