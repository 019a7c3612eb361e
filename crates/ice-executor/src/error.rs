//! Executor and sandbox errors.

use thiserror::Error;

/// Errors raised while executing a single node.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// No executor/tool/agent/factory was registered under the required
    /// name.
    #[error("registry lookup failed: {0}")]
    Registry(#[from] ice_registry::RegistryError),

    /// Input resolution or template rendering failed.
    #[error("context error: {0}")]
    Context(#[from] ice_context::ContextError),

    /// An expression (condition/monitor/recursive convergence) failed to
    /// parse or evaluate.
    #[error("expression error: {0}")]
    Expression(#[from] ice_expression::ExpressionError),

    /// The node's wall-clock deadline elapsed before it completed.
    #[error("node execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The run's cancellation token was triggered while this node was
    /// in flight.
    #[error("execution cancelled")]
    Cancelled,

    /// A tool invocation failed.
    #[error("tool {tool_name:?} failed: {message}")]
    ToolFailed {
        /// The tool that was invoked.
        tool_name: String,
        /// The failure message.
        message: String,
    },

    /// An LLM call failed.
    #[error("llm call failed: {0}")]
    LlmFailed(String),

    /// An agent run failed.
    #[error("agent run failed: {0}")]
    AgentFailed(String),

    /// A sub-workflow run failed.
    #[error("sub-workflow run failed: {0}")]
    WorkflowFailed(String),

    /// A human node's response deadline elapsed.
    #[error("human response timed out")]
    HumanTimeout,

    /// The node's configuration was internally inconsistent in a way the
    /// validator should have caught; surfaced defensively at run time.
    #[error("invalid node configuration: {0}")]
    InvalidConfig(String),
}

impl ExecutorError {
    /// Whether retrying this error is worthwhile. Structural failures
    /// (bad config, unknown tool, invalid expression) are never retried;
    /// transient failures (tool/llm/agent/workflow errors, timeouts) are.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutorError::Timeout(_)
                | ExecutorError::ToolFailed { .. }
                | ExecutorError::LlmFailed(_)
                | ExecutorError::AgentFailed(_)
                | ExecutorError::WorkflowFailed(_)
        )
    }

    /// The class name surfaced as `NodeMetadata.error_type`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            ExecutorError::Registry(_) => "RegistryError",
            ExecutorError::Context(_) => "ContextError",
            ExecutorError::Expression(_) => "ExpressionError",
            ExecutorError::Timeout(_) => "Timeout",
            ExecutorError::Cancelled => "Cancelled",
            ExecutorError::ToolFailed { .. } => "ToolError",
            ExecutorError::LlmFailed(_) => "LlmError",
            ExecutorError::AgentFailed(_) => "AgentError",
            ExecutorError::WorkflowFailed(_) => "WorkflowError",
            ExecutorError::HumanTimeout => "HumanTimeout",
            ExecutorError::InvalidConfig(_) => "InvalidConfig",
        }
    }
}
