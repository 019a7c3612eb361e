//! The pluggable backends a node executor dispatches through. Concrete
//! implementations (an HTTP tool caller, an OpenAI client, an agent
//! runtime) are registered in [`ice_registry::Registry`] and resolved by
//! name at execution time; this crate only depends on the trait shape.

use async_trait::async_trait;
use ice_core::UsageMetadata;
use serde_json::Value;

/// Invokes a registered tool by name.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Call `tool_name` with `args`, returning its raw JSON result.
    async fn invoke(&self, tool_name: &str, args: Value) -> Result<Value, String>;
}

/// The result of an LLM completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmCompletion {
    /// The model's text response.
    pub text: String,
    /// Token/cost usage, when the provider reports it.
    pub usage: Option<UsageMetadata>,
}

/// Calls a language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete `prompt` against `model`, with provider-specific
    /// `config` (temperature, max_tokens, ...).
    async fn complete(&self, model: &str, prompt: &str, config: &Value) -> Result<LlmCompletion, String>;
}

/// Runs a registered agent's plan-act-observe loop.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run `package` bounded by `max_iterations`, returning its final
    /// message or last tool result.
    async fn run(&self, package: &str, config: &Value, max_iterations: u32, context: &Value) -> Result<Value, String>;
}

/// Runs a registered sub-workflow as a child execution.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    /// Execute `workflow_ref` as a child workflow with `overrides`
    /// merged into its initial context, returning its final result map.
    async fn run_workflow(&self, workflow_ref: &str, overrides: &Value, initial_context: &Value) -> Result<Value, String>;
}
