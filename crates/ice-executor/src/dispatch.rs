//! The dispatcher: resolves a node's kind to the right backend call,
//! wraps it in the sandbox's deadline/cancellation guard, and retries
//! retryable failures with exponential backoff before producing a final
//! [`NodeExecutionResult`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ice_blueprint::{NodeKindSpec, NodeSpec};
use ice_context::ExecutionContext;
use ice_core::{NodeExecutionResult, NodeMetadata};
use ice_eventbus::{EventBus, ExecutionEvent};
use ice_registry::{EntityClass, Registry};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;
use crate::human::HumanResponseRegistry;
use crate::result::ActionResult;
use crate::retry::RetryPolicy;
use crate::sandbox::{run_guarded, CodeSandboxRunner, DEFAULT_TOOL_TIMEOUT};
use crate::traits::{AgentRunner, LlmClient, ToolInvoker, WorkflowRunner};

const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(300);

/// Holds the registry, event bus, and optional sandbox backend used to run
/// every node kind. One `Dispatcher` is shared across a run's concurrent
/// node tasks.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    event_bus: Arc<EventBus>,
    human_responses: HumanResponseRegistry,
    code_sandbox: Option<Arc<dyn CodeSandboxRunner>>,
}

impl Dispatcher {
    /// Build a dispatcher over a shared registry and event bus.
    #[must_use]
    pub fn new(registry: Arc<Registry>, event_bus: Arc<EventBus>) -> Self {
        Self { registry, event_bus, human_responses: HumanResponseRegistry::new(), code_sandbox: None }
    }

    /// Attach a `code` node sandbox backend.
    #[must_use]
    pub fn with_code_sandbox(mut self, sandbox: Arc<dyn CodeSandboxRunner>) -> Self {
        self.code_sandbox = Some(sandbox);
        self
    }

    /// Deliver an external response to a suspended `human` node. Returns
    /// `false` if no node is currently waiting under that run/node pair.
    pub fn respond_to_human(&self, run_id: &str, node_id: &str, value: Value) -> bool {
        self.human_responses.respond(run_id, node_id, value)
    }

    /// Run one node to completion, honoring its declared timeout,
    /// retries, and backoff, and always returning a
    /// [`NodeExecutionResult`] (never an `Err`): failures are recorded in
    /// the result itself.
    pub async fn execute_node(
        &self,
        node: &NodeSpec,
        ctx: &ExecutionContext,
        cancellation: &CancellationToken,
        run_id: &str,
    ) -> NodeExecutionResult {
        let start = chrono::Utc::now();
        let timeout = node
            .timeout_seconds
            .map(Duration::from_secs_f64)
            .unwrap_or(match &node.kind {
                NodeKindSpec::Tool { .. } => DEFAULT_TOOL_TIMEOUT,
                _ => DEFAULT_NODE_TIMEOUT,
            });
        let policy = RetryPolicy { retries: node.retries, backoff_seconds: node.backoff_seconds };

        let mut attempt = 0u32;
        let outcome = loop {
            let result = run_guarded(timeout, cancellation, self.run_kind(node, ctx, cancellation, run_id)).await;
            match result {
                Ok(action) => break Ok(action),
                Err(err) if err.is_retryable() && policy.allows(attempt + 1) => {
                    attempt += 1;
                    self.event_bus
                        .publish(ExecutionEvent::NodeRetrying {
                            run_id: run_id.to_owned(),
                            node_id: node.id.to_string(),
                            attempt,
                            timestamp: chrono::Utc::now(),
                        })
                        .await
                        .ok();
                    tracing::warn!(node_id = %node.id, attempt, "node retrying after retryable error: {err}");
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
                Err(err) => break Err(err),
            }
        };

        let end = chrono::Utc::now();
        let duration_seconds = (end - start).num_milliseconds().max(0) as f64 / 1000.0;
        let metadata = NodeMetadata {
            node_id: node.id.to_string(),
            kind: node.kind.kind_name().to_owned(),
            start_time: start,
            end_time: end,
            duration_seconds,
            provider: node.provider.clone(),
            error_type: outcome.as_ref().err().map(ExecutorError::error_type).map(str::to_owned),
        };

        match outcome {
            Ok(action) => NodeExecutionResult::success(action.primary_output(), metadata, None),
            Err(err) => NodeExecutionResult::failure(err.to_string(), metadata),
        }
    }

    fn run_kind<'a>(
        &'a self,
        node: &'a NodeSpec,
        ctx: &'a ExecutionContext,
        cancellation: &'a CancellationToken,
        run_id: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<ActionResult<Value>, ExecutorError>> + Send + 'a>> {
        Box::pin(async move {
            match &node.kind {
                NodeKindSpec::Tool { tool_name, tool_args } => self.run_tool(tool_name, tool_args, ctx).await,
                NodeKindSpec::Llm { model, prompt, llm_config, llm_name } => {
                    self.run_llm(ctx, model, prompt, llm_config, llm_name.as_deref()).await
                }
                NodeKindSpec::Agent { package, agent_config, max_iterations } => {
                    self.run_agent(ctx, package, agent_config, *max_iterations).await
                }
                NodeKindSpec::Condition { expression, .. } => self.run_condition(ctx, expression),
                NodeKindSpec::Loop { items_source, item_var, body, max_iterations } => {
                    self.run_loop(ctx, items_source, item_var, body, *max_iterations, cancellation, run_id).await
                }
                NodeKindSpec::Parallel { branches, wait_strategy, merge_outputs } => {
                    self.run_parallel(ctx, branches, *wait_strategy, *merge_outputs, cancellation, run_id).await
                }
                NodeKindSpec::Workflow { workflow_ref, config_overrides, exposed_outputs } => {
                    self.run_workflow(ctx, workflow_ref, config_overrides, exposed_outputs).await
                }
                NodeKindSpec::Recursive { agent_package, workflow_ref, convergence_condition, max_iterations, .. } => {
                    self.run_recursive(ctx, agent_package.as_deref(), workflow_ref.as_deref(), convergence_condition, *max_iterations)
                        .await
                }
                NodeKindSpec::Code { language, code, imports, .. } => self.run_code(ctx, language, code, imports).await,
                NodeKindSpec::Human { prompt_message, approval_type, choices, timeout_seconds } => {
                    self.run_human(run_id, &node.id.to_string(), prompt_message, *approval_type, choices, *timeout_seconds).await
                }
                NodeKindSpec::Monitor { metric_expression, action_on_trigger, .. } => {
                    self.run_monitor(ctx, metric_expression, *action_on_trigger)
                }
                NodeKindSpec::Swarm { agents, coordination_strategy } => {
                    self.run_swarm(ctx, agents, *coordination_strategy).await
                }
            }
        })
    }

    async fn run_tool(
        &self,
        tool_name: &str,
        tool_args: &BTreeMap<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult<Value>, ExecutorError> {
        let invoker: Arc<Arc<dyn ToolInvoker>> = self.registry.get(EntityClass::Tool, tool_name)?;
        let mut rendered = serde_json::Map::new();
        for (key, value) in tool_args {
            rendered.insert(key.clone(), render_value(value, ctx)?);
        }
        let output = invoker
            .invoke(tool_name, Value::Object(rendered))
            .await
            .map_err(|message| ExecutorError::ToolFailed { tool_name: tool_name.to_owned(), message })?;
        let wrapped = if output.is_object() { output } else { serde_json::json!({"result": output}) };
        Ok(ActionResult::Success(wrapped))
    }

    async fn run_llm(
        &self,
        ctx: &ExecutionContext,
        model: &str,
        prompt: &str,
        llm_config: &BTreeMap<String, Value>,
        llm_name: Option<&str>,
    ) -> Result<ActionResult<Value>, ExecutorError> {
        let rendered_prompt = ctx.render_templates(prompt)?;
        let lookup_name = llm_name.unwrap_or(model);
        let client: Arc<Arc<dyn LlmClient>> = self.registry.get(EntityClass::LlmFactory, lookup_name)?;
        let config = serde_json::to_value(llm_config).unwrap_or(Value::Null);
        let completion = client
            .complete(model, &rendered_prompt, &config)
            .await
            .map_err(ExecutorError::LlmFailed)?;
        Ok(ActionResult::Success(serde_json::json!({
            "response": completion.text,
            "text": completion.text,
            "prompt": rendered_prompt,
            "model": model,
            "usage": completion.usage,
        })))
    }

    async fn run_agent(
        &self,
        ctx: &ExecutionContext,
        package: &str,
        agent_config: &BTreeMap<String, Value>,
        max_iterations: u32,
    ) -> Result<ActionResult<Value>, ExecutorError> {
        let runner: Arc<Arc<dyn AgentRunner>> = self.registry.get(EntityClass::Agent, package)?;
        let config = serde_json::to_value(agent_config).unwrap_or(Value::Null);
        let output = runner
            .run(package, &config, max_iterations, &ctx.template_vars())
            .await
            .map_err(ExecutorError::AgentFailed)?;
        Ok(ActionResult::Success(output))
    }

    fn run_condition(&self, ctx: &ExecutionContext, expression: &str) -> Result<ActionResult<Value>, ExecutorError> {
        let taken = ice_expression::eval_bool(expression, &ctx.template_vars())?;
        Ok(ActionResult::Branch { taken })
    }

    async fn run_loop(
        &self,
        ctx: &ExecutionContext,
        items_source: &str,
        item_var: &str,
        body: &[NodeSpec],
        max_iterations: u32,
        cancellation: &CancellationToken,
        run_id: &str,
    ) -> Result<ActionResult<Value>, ExecutorError> {
        let vars = ctx.template_vars();
        let items = resolve_dotted(&vars, items_source)
            .and_then(|v| v.as_array().cloned())
            .ok_or_else(|| ExecutorError::InvalidConfig(format!("items_source {items_source:?} did not resolve to a list")))?;

        let mut outputs = Vec::new();
        for item in items.into_iter().take(max_iterations as usize) {
            let mut globals = serde_json::Map::new();
            if let Value::Object(existing) = ctx.template_vars() {
                globals.extend(existing);
            }
            globals.insert(item_var.to_owned(), item);
            let mut iteration_ctx = ExecutionContext::new(globals.into_iter().collect());

            let mut last = Value::Null;
            for step in body {
                let result = self.execute_node(step, &iteration_ctx, cancellation, run_id).await;
                if !result.success {
                    return Err(ExecutorError::WorkflowFailed(result.error.unwrap_or_default()));
                }
                last = result.output.clone().unwrap_or(Value::Null);
                iteration_ctx.commit(step.id.to_string(), result);
            }
            outputs.push(last);
        }
        Ok(ActionResult::Success(Value::Array(outputs)))
    }

    async fn run_parallel(
        &self,
        ctx: &ExecutionContext,
        branches: &[Vec<NodeSpec>],
        wait_strategy: ice_blueprint::WaitStrategy,
        merge_outputs: bool,
        cancellation: &CancellationToken,
        run_id: &str,
    ) -> Result<ActionResult<Value>, ExecutorError> {
        use ice_blueprint::WaitStrategy;

        let branch_token = cancellation.child_token();
        let mut join_set: tokio::task::JoinSet<Result<Value, ()>> = tokio::task::JoinSet::new();
        for branch in branches.to_vec() {
            let token = branch_token.clone();
            let ctx = ctx.clone();
            let dispatcher = self.clone();
            let run_id = run_id.to_owned();
            join_set.spawn(async move {
                let mut branch_ctx = ctx;
                let mut last = Value::Null;
                for step in &branch {
                    let result = dispatcher.execute_node(step, &branch_ctx, &token, &run_id).await;
                    let ok = result.success;
                    last = result.output.clone().unwrap_or(Value::Null);
                    branch_ctx.commit(step.id.to_string(), result);
                    if !ok {
                        return Err(());
                    }
                }
                Ok(last)
            });
        }

        match wait_strategy {
            WaitStrategy::All => {
                let mut values = Vec::with_capacity(branches.len());
                while let Some(joined) = join_set.join_next().await {
                    match joined.expect("parallel branch task never panics under normal operation") {
                        Ok(value) => values.push(value),
                        Err(()) => return Err(ExecutorError::WorkflowFailed("a parallel branch failed".to_owned())),
                    }
                }
                Ok(self.finish_parallel(values, merge_outputs))
            }
            WaitStrategy::Any => {
                let mut winner = None;
                while let Some(joined) = join_set.join_next().await {
                    if let Ok(Ok(value)) = joined {
                        winner = Some(value);
                        break;
                    }
                }
                branch_token.cancel();
                drop(join_set);
                match winner {
                    Some(value) => Ok(self.finish_parallel(vec![value], merge_outputs)),
                    None => Err(ExecutorError::WorkflowFailed("no parallel branch succeeded".to_owned())),
                }
            }
            WaitStrategy::Race => {
                let settled = join_set.join_next().await;
                branch_token.cancel();
                drop(join_set);
                match settled {
                    Some(Ok(Ok(value))) => Ok(self.finish_parallel(vec![value], merge_outputs)),
                    _ => Err(ExecutorError::WorkflowFailed("race produced no settled branch".to_owned())),
                }
            }
        }
    }

    fn finish_parallel(&self, values: Vec<Value>, merge_outputs: bool) -> ActionResult<Value> {
        if merge_outputs && values.iter().all(Value::is_object) {
            let mut merged = serde_json::Map::new();
            for value in values {
                if let Value::Object(map) = value {
                    for (key, v) in map {
                        merged
                            .entry(key)
                            .and_modify(|existing| promote_to_list(existing, v.clone()))
                            .or_insert(v);
                    }
                }
            }
            ActionResult::Success(Value::Object(merged))
        } else {
            ActionResult::MultiOutput(values)
        }
    }

    async fn run_workflow(
        &self,
        ctx: &ExecutionContext,
        workflow_ref: &str,
        config_overrides: &BTreeMap<String, Value>,
        exposed_outputs: &BTreeMap<String, String>,
    ) -> Result<ActionResult<Value>, ExecutorError> {
        let runner: Arc<Arc<dyn WorkflowRunner>> = self.registry.get(EntityClass::Workflow, workflow_ref)?;
        let overrides = serde_json::to_value(config_overrides).unwrap_or(Value::Null);
        let output = runner
            .run_workflow(workflow_ref, &overrides, &ctx.template_vars())
            .await
            .map_err(ExecutorError::WorkflowFailed)?;

        if exposed_outputs.is_empty() {
            return Ok(ActionResult::Success(output));
        }
        let mut mapped = serde_json::Map::new();
        for (external, internal_path) in exposed_outputs {
            if let Some(value) = resolve_dotted(&output, internal_path) {
                mapped.insert(external.clone(), value.clone());
            }
        }
        Ok(ActionResult::Success(Value::Object(mapped)))
    }

    async fn run_recursive(
        &self,
        ctx: &ExecutionContext,
        agent_package: Option<&str>,
        workflow_ref: Option<&str>,
        convergence_condition: &str,
        max_iterations: u32,
    ) -> Result<ActionResult<Value>, ExecutorError> {
        let mut iteration = 0u32;
        let mut last_output = Value::Null;

        loop {
            let vars = ctx.template_vars();
            if ice_expression::eval_bool(convergence_condition, &vars)? {
                return Ok(ActionResult::Success(serde_json::json!({
                    "converged": true,
                    "reason": "condition_met",
                    "_recursive_iteration": iteration,
                    "_can_recurse": false,
                })));
            }
            if iteration >= max_iterations {
                return Ok(ActionResult::Success(serde_json::json!({
                    "converged": false,
                    "reason": "max_iterations_reached",
                    "_recursive_iteration": iteration,
                    "_can_recurse": false,
                })));
            }

            last_output = if let Some(package) = agent_package {
                let runner: Arc<Arc<dyn AgentRunner>> = self.registry.get(EntityClass::Agent, package)?;
                runner
                    .run(package, &Value::Null, max_iterations, &vars)
                    .await
                    .map_err(ExecutorError::AgentFailed)?
            } else if let Some(workflow_ref) = workflow_ref {
                let runner: Arc<Arc<dyn WorkflowRunner>> = self.registry.get(EntityClass::Workflow, workflow_ref)?;
                runner
                    .run_workflow(workflow_ref, &Value::Null, &vars)
                    .await
                    .map_err(ExecutorError::WorkflowFailed)?
            } else {
                return Err(ExecutorError::InvalidConfig(
                    "recursive node requires agent_package or workflow_ref".to_owned(),
                ));
            };

            iteration += 1;
            let _ = &last_output;
        }
    }

    async fn run_code(&self, ctx: &ExecutionContext, language: &ice_blueprint::CodeLanguage, code: &str, imports: &[String]) -> Result<ActionResult<Value>, ExecutorError> {
        let sandbox = self
            .code_sandbox
            .as_ref()
            .ok_or_else(|| ExecutorError::InvalidConfig("no code sandbox backend is registered".to_owned()))?;
        let language = match language {
            ice_blueprint::CodeLanguage::Python => "python",
            ice_blueprint::CodeLanguage::Javascript => "javascript",
        };
        let output = sandbox.run(language, code, imports, ctx.template_vars()).await?;
        Ok(ActionResult::Success(serde_json::to_value(output).unwrap_or(Value::Null)))
    }

    async fn run_human(
        &self,
        run_id: &str,
        node_id: &str,
        prompt_message: &str,
        approval_type: ice_blueprint::ApprovalType,
        choices: &[String],
        timeout_seconds: Option<f64>,
    ) -> Result<ActionResult<Value>, ExecutorError> {
        use ice_blueprint::ApprovalType;
        if matches!(approval_type, ApprovalType::Choice) && choices.is_empty() {
            return Err(ExecutorError::InvalidConfig("choice approval requires a non-empty choices list".to_owned()));
        }

        let receiver = self.human_responses.register(run_id, node_id);
        self.event_bus
            .publish(ExecutionEvent::NodeProgress {
                run_id: run_id.to_owned(),
                node_id: node_id.to_owned(),
                detail: serde_json::json!({
                    "awaiting_human_response": true,
                    "prompt_message": prompt_message,
                    "approval_type": approval_type,
                    "choices": choices,
                }),
                timestamp: chrono::Utc::now(),
            })
            .await
            .ok();

        let response = match timeout_seconds.map(Duration::from_secs_f64) {
            Some(deadline) => match tokio::time::timeout(deadline, receiver).await {
                Ok(Ok(value)) => value,
                Ok(Err(_)) | Err(_) => return Err(ExecutorError::HumanTimeout),
            },
            None => receiver.await.map_err(|_| ExecutorError::HumanTimeout)?,
        };
        Ok(ActionResult::Success(response))
    }

    fn run_monitor(&self, ctx: &ExecutionContext, metric_expression: &str, action_on_trigger: ice_blueprint::ActionOnTrigger) -> Result<ActionResult<Value>, ExecutorError> {
        use ice_blueprint::ActionOnTrigger;
        let triggered = ice_expression::eval_bool(metric_expression, &ctx.template_vars())?;
        let action_taken = if triggered {
            match action_on_trigger {
                ActionOnTrigger::Pause => "pause",
                ActionOnTrigger::Abort => "abort",
                ActionOnTrigger::AlertOnly => "alert_only",
            }
        } else {
            "none"
        };
        Ok(ActionResult::Success(serde_json::json!({
            "checks_performed": 1,
            "triggers_fired": u32::from(triggered),
            "action_taken": action_taken,
        })))
    }

    async fn run_swarm(&self, ctx: &ExecutionContext, agents: &[ice_blueprint::AgentSpec], coordination_strategy: ice_blueprint::CoordinationStrategy) -> Result<ActionResult<Value>, ExecutorError> {
        let vars = ctx.template_vars();
        let mut by_role = serde_json::Map::new();
        for agent in agents {
            let runner: Arc<Arc<dyn AgentRunner>> = self.registry.get(EntityClass::Agent, &agent.package)?;
            let config = serde_json::to_value(&agent.agent_config).unwrap_or(Value::Null);
            let output = runner
                .run(&agent.package, &config, 1, &vars)
                .await
                .map_err(ExecutorError::AgentFailed)?;
            by_role.insert(agent.role.clone(), output);
        }
        Ok(ActionResult::Success(serde_json::json!({
            "coordination_strategy": format!("{coordination_strategy:?}"),
            "results": by_role,
        })))
    }
}

fn render_value(value: &Value, ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
    match value {
        Value::String(s) => Ok(Value::String(ctx.render_templates(s)?)),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), render_value(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(render_value(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_dotted<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = value;
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        cur = cur.get(part)?;
    }
    Some(cur)
}

fn promote_to_list(existing: &mut Value, incoming: Value) {
    match existing {
        Value::Array(items) => items.push(incoming),
        other => {
            let previous = other.clone();
            *other = Value::Array(vec![previous, incoming]);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use ice_blueprint::NodeKindSpec;
    use ice_core::NodeId;

    use super::*;

    struct EchoTool;

    #[async_trait::async_trait]
    impl ToolInvoker for EchoTool {
        async fn invoke(&self, _tool_name: &str, args: Value) -> Result<Value, String> {
            Ok(args)
        }
    }

    struct FailingTool;

    #[async_trait::async_trait]
    impl ToolInvoker for FailingTool {
        async fn invoke(&self, _tool_name: &str, _args: Value) -> Result<Value, String> {
            Err("boom".to_owned())
        }
    }

    fn node(id: &str, kind: NodeKindSpec) -> NodeSpec {
        NodeSpec {
            id: NodeId::new(id).unwrap(),
            kind,
            dependencies: BTreeSet::new(),
            input_mappings: BTreeMap::new(),
            output_schema: Some(serde_json::json!({})),
            input_schema: None,
            retries: 0,
            backoff_seconds: 0.0,
            timeout_seconds: None,
            provider: None,
        }
    }

    fn dispatcher_with_tool(invoker: Arc<dyn ToolInvoker>) -> Dispatcher {
        let registry = Registry::new();
        registry
            .register_instance(EntityClass::Tool, "echo", Arc::new(invoker))
            .unwrap();
        Dispatcher::new(Arc::new(registry), Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn tool_node_succeeds_and_wraps_output() {
        let dispatcher = dispatcher_with_tool(Arc::new(EchoTool));
        let node = node(
            "n1",
            NodeKindSpec::Tool { tool_name: "echo".into(), tool_args: BTreeMap::from([("x".into(), Value::from(1))]) },
        );
        let ctx = ExecutionContext::default();
        let token = CancellationToken::new();
        let result = dispatcher.execute_node(&node, &ctx, &token, "run-1").await;
        assert!(result.success);
        assert_eq!(result.output.unwrap()["x"], 1);
    }

    #[tokio::test]
    async fn failing_tool_is_retried_then_fails() {
        let dispatcher = dispatcher_with_tool(Arc::new(FailingTool));
        let mut node = node(
            "n1",
            NodeKindSpec::Tool { tool_name: "echo".into(), tool_args: BTreeMap::new() },
        );
        node.retries = 2;
        node.backoff_seconds = 0.0;
        let ctx = ExecutionContext::default();
        let token = CancellationToken::new();
        let result = dispatcher.execute_node(&node, &ctx, &token, "run-1").await;
        assert!(!result.success);
        assert_eq!(result.metadata.error_type.as_deref(), Some("ToolError"));
    }

    #[tokio::test]
    async fn condition_node_evaluates_expression() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(EventBus::new()));
        let node = node(
            "cond",
            NodeKindSpec::Condition { expression: "x > 0".into(), true_branch: vec![], false_branch: vec![] },
        );
        let ctx = ExecutionContext::new(BTreeMap::from([("x".to_owned(), Value::from(5))]));
        let token = CancellationToken::new();
        let result = dispatcher.execute_node(&node, &ctx, &token, "run-1").await;
        assert!(result.success);
        assert_eq!(result.output.unwrap()["result"], true);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_retried() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(EventBus::new()));
        let mut node = node("n1", NodeKindSpec::Tool { tool_name: "missing".into(), tool_args: BTreeMap::new() });
        node.retries = 5;
        let ctx = ExecutionContext::default();
        let token = CancellationToken::new();
        let result = dispatcher.execute_node(&node, &ctx, &token, "run-1").await;
        assert!(!result.success);
        assert_eq!(result.metadata.error_type.as_deref(), Some("RegistryError"));
    }

    #[tokio::test]
    async fn monitor_node_reports_abort_action_when_triggered() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(EventBus::new()));
        let node = node(
            "mon",
            NodeKindSpec::Monitor {
                metric_expression: "true".into(),
                action_on_trigger: ice_blueprint::ActionOnTrigger::Abort,
                alert_channels: vec![],
            },
        );
        let ctx = ExecutionContext::default();
        let token = CancellationToken::new();
        let result = dispatcher.execute_node(&node, &ctx, &token, "run-1").await;
        assert!(result.success);
        assert_eq!(result.output.unwrap()["action_taken"], "abort");
    }

    #[tokio::test]
    async fn human_node_times_out_when_no_response_arrives() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(EventBus::new()));
        let node = node(
            "approve",
            NodeKindSpec::Human {
                prompt_message: "approve?".into(),
                approval_type: ice_blueprint::ApprovalType::ApproveReject,
                choices: vec![],
                timeout_seconds: Some(0.05),
            },
        );
        let ctx = ExecutionContext::default();
        let token = CancellationToken::new();
        let result = dispatcher.execute_node(&node, &ctx, &token, "run-1").await;
        assert!(!result.success);
        assert_eq!(result.metadata.error_type.as_deref(), Some("HumanTimeout"));
    }

    #[tokio::test]
    async fn human_node_resumes_once_a_response_is_delivered() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(EventBus::new()));
        let node = node(
            "approve",
            NodeKindSpec::Human {
                prompt_message: "approve?".into(),
                approval_type: ice_blueprint::ApprovalType::ApproveReject,
                choices: vec![],
                timeout_seconds: None,
            },
        );
        let ctx = ExecutionContext::default();
        let token = CancellationToken::new();
        let dispatcher_clone = dispatcher.clone();
        let handle = tokio::spawn(async move { dispatcher_clone.execute_node(&node, &ctx, &token, "run-1").await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(dispatcher.respond_to_human("run-1", "approve", serde_json::json!({"approved": true})));
        let result = handle.await.unwrap();
        assert!(result.success);
        assert_eq!(result.output.unwrap()["approved"], true);
    }

    struct SlowTool;

    #[async_trait::async_trait]
    impl ToolInvoker for SlowTool {
        async fn invoke(&self, _tool_name: &str, args: Value) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(args)
        }
    }

    #[tokio::test]
    async fn parallel_race_returns_the_first_branch_to_settle() {
        let registry = Registry::new();
        registry.register_instance(EntityClass::Tool, "fast", Arc::new(Arc::new(EchoTool) as Arc<dyn ToolInvoker>)).unwrap();
        registry.register_instance(EntityClass::Tool, "slow", Arc::new(Arc::new(SlowTool) as Arc<dyn ToolInvoker>)).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(EventBus::new()));
        let fast = vec![node("fast", NodeKindSpec::Tool { tool_name: "fast".into(), tool_args: BTreeMap::new() })];
        let slow = vec![node("slow", NodeKindSpec::Tool { tool_name: "slow".into(), tool_args: BTreeMap::new() })];
        let node_spec = node(
            "race",
            NodeKindSpec::Parallel {
                branches: vec![fast, slow],
                wait_strategy: ice_blueprint::WaitStrategy::Race,
                merge_outputs: false,
            },
        );
        let ctx = ExecutionContext::default();
        let token = CancellationToken::new();
        let result = dispatcher.execute_node(&node_spec, &ctx, &token, "run-1").await;
        assert!(result.success);
    }
}
