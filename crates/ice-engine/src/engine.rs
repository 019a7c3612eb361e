//! `WorkflowEngine`: dispatches a validated blueprint level by level,
//! bounding concurrency within a level, propagating skips across
//! condition branches, and applying budget/depth guards between levels.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ice_blueprint::{Blueprint, DependencyGraph, NodeKindSpec, NodeSpec};
use ice_context::{ContextError, ExecutionContext};
use ice_core::{CostMeta, NodeExecutionResult, NodeId, NodeMetadata, RunId, UsageMetadata};
use ice_eventbus::{EventBus, ExecutionEvent};
use ice_executor::Dispatcher;
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{EngineConfig, FailurePolicy};
use crate::error::EngineError;
use crate::run::{RunStatus, RunSummary};
use crate::skip;

/// Orchestrates one run of a validated blueprint.
#[derive(Clone)]
pub struct WorkflowEngine {
    dispatcher: Dispatcher,
    event_bus: Arc<EventBus>,
    config: EngineConfig,
}

impl WorkflowEngine {
    /// Build an engine over a dispatcher, event bus, and config.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, event_bus: Arc<EventBus>, config: EngineConfig) -> Self {
        Self {
            dispatcher,
            event_bus,
            config,
        }
    }

    /// Run a blueprint to completion (or until halted/aborted/cancelled).
    pub async fn execute(
        &self,
        blueprint: &Blueprint,
        run_id: RunId,
        initial_context: BTreeMap<String, Value>,
        cancellation: CancellationToken,
    ) -> Result<RunSummary, EngineError> {
        let graph = DependencyGraph::new(
            blueprint
                .nodes
                .iter()
                .map(|n| (n.id.clone(), n.dependencies.clone())),
        );
        let levels = graph.compute_levels().ok_or(EngineError::CyclicGraph)?;

        let ctx = Arc::new(Mutex::new(ExecutionContext::new(initial_context)));
        let cost = Arc::new(Mutex::new(CostMeta::default()));

        self.event_bus
            .publish(ExecutionEvent::WorkflowStarted {
                run_id: run_id.to_string(),
                total_nodes: blueprint.nodes.len(),
                timestamp: chrono::Utc::now(),
            })
            .await?;

        let mut skipped_ids: Vec<String> = Vec::new();
        let mut status = RunStatus::Completed;
        let mut abort_reason: Option<String> = None;
        let mut failed_ids: BTreeSet<NodeId> = BTreeSet::new();
        let mut last_checkpoint = std::time::Instant::now();

        'levels: for (level_index, level) in levels.iter().enumerate() {
            if cancellation.is_cancelled() {
                status = RunStatus::Cancelled;
                break;
            }

            if let Some(ceiling) = self.config.depth_ceiling {
                if level_index as u32 >= ceiling {
                    status = RunStatus::Aborted;
                    abort_reason = Some(EngineError::DepthCeilingExceeded(ceiling).to_string());
                    break 'levels;
                }
            }

            let mut current_skip = {
                let locked = ctx.lock().await;
                skip::compute_skipped(blueprint, locked.branch_decisions())
            };
            if self.config.failure_policy == FailurePolicy::ContinuePossible {
                current_skip.extend(skip::compute_failure_skipped(blueprint, &failed_ids));
            }

            let mut to_run: Vec<NodeSpec> = Vec::new();
            for node_id in level {
                if current_skip.contains(node_id) {
                    skipped_ids.push(node_id.to_string());
                    self.event_bus
                        .publish(ExecutionEvent::NodeSkipped {
                            run_id: run_id.to_string(),
                            node_id: node_id.to_string(),
                            timestamp: chrono::Utc::now(),
                        })
                        .await?;
                    continue;
                }
                if let Some(node) = blueprint.node(node_id) {
                    to_run.push(node.clone());
                }
            }

            if to_run.is_empty() {
                continue;
            }

            self.event_bus
                .publish(ExecutionEvent::LevelStarted {
                    run_id: run_id.to_string(),
                    level: level_index,
                    node_ids: to_run.iter().map(|n| n.id.to_string()).collect(),
                    timestamp: chrono::Utc::now(),
                })
                .await?;

            let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
            let mut join_set = JoinSet::new();

            for node in to_run {
                let permit = semaphore.clone();
                let dispatcher = self.dispatcher.clone();
                let ctx = ctx.clone();
                let event_bus = self.event_bus.clone();
                let token = cancellation.clone();
                let run_id_string = run_id.to_string();

                join_set.spawn(async move {
                    let _permit = permit.acquire_owned().await.expect("semaphore never closes");

                    event_bus
                        .publish(ExecutionEvent::NodeQueued {
                            run_id: run_id_string.clone(),
                            node_id: node.id.to_string(),
                            timestamp: chrono::Utc::now(),
                        })
                        .await
                        .ok();

                    let node_ctx = {
                        let locked = ctx.lock().await;
                        node_scoped_context(&locked, &node)
                    };
                    let node_ctx = match node_ctx {
                        Ok(node_ctx) => node_ctx,
                        Err(err) => {
                            let now = chrono::Utc::now();
                            let metadata = NodeMetadata {
                                node_id: node.id.to_string(),
                                kind: node.kind.kind_name().to_owned(),
                                start_time: now,
                                end_time: now,
                                duration_seconds: 0.0,
                                provider: node.provider.clone(),
                                error_type: Some("ContextError".to_owned()),
                            };
                            let result = NodeExecutionResult::failure(err.to_string(), metadata);
                            event_bus
                                .publish(ExecutionEvent::NodeFailed {
                                    run_id: run_id_string.clone(),
                                    node_id: node.id.to_string(),
                                    error: result.error.clone().unwrap_or_default(),
                                    timestamp: now,
                                })
                                .await
                                .ok();
                            return (node, result);
                        }
                    };

                    event_bus
                        .publish(ExecutionEvent::NodeStarted {
                            run_id: run_id_string.clone(),
                            node_id: node.id.to_string(),
                            timestamp: chrono::Utc::now(),
                        })
                        .await
                        .ok();

                    let result = dispatcher.execute_node(&node, &node_ctx, &token, &run_id_string).await;

                    if result.success {
                        event_bus
                            .publish(ExecutionEvent::NodeCompleted {
                                run_id: run_id_string.clone(),
                                node_id: node.id.to_string(),
                                duration_seconds: result.metadata.duration_seconds,
                                output_preview: result.output.clone().unwrap_or(Value::Null),
                                timestamp: chrono::Utc::now(),
                            })
                            .await
                            .ok();
                    } else {
                        event_bus
                            .publish(ExecutionEvent::NodeFailed {
                                run_id: run_id_string.clone(),
                                node_id: node.id.to_string(),
                                error: result.error.clone().unwrap_or_default(),
                                timestamp: chrono::Utc::now(),
                            })
                            .await
                            .ok();
                    }

                    (node, result)
                });
            }

            let mut level_failed = false;
            let mut monitor_abort = false;
            let mut monitor_pause = false;
            while let Some(joined) = join_set.join_next().await {
                let (node, result) = joined.expect("node task never panics under normal operation");

                if let Some(output) = &result.output {
                    if let Some(taken) = output.get("result").and_then(Value::as_bool) {
                        if matches!(node.kind, NodeKindSpec::Condition { .. }) {
                            ctx.lock().await.record_branch_decision(node.id.to_string(), taken);
                        }
                    }
                    if let Some(usage) = extract_usage(output) {
                        let mut cost_guard = cost.lock().await;
                        cost_guard.accumulate(&usage);
                        self.event_bus
                            .publish(ExecutionEvent::ResourceTokenUpdate {
                                run_id: run_id.to_string(),
                                total_tokens: cost_guard.total_tokens,
                                timestamp: chrono::Utc::now(),
                            })
                            .await
                            .ok();
                        self.event_bus
                            .publish(ExecutionEvent::ResourceCostUpdate {
                                run_id: run_id.to_string(),
                                total_cost_usd: cost_guard.total_cost_usd,
                                timestamp: chrono::Utc::now(),
                            })
                            .await
                            .ok();
                    }
                    if result.success && matches!(node.kind, NodeKindSpec::Monitor { .. }) {
                        match output.get("action_taken").and_then(Value::as_str) {
                            Some("abort") => {
                                monitor_abort = true;
                                cancellation.cancel();
                            }
                            Some("pause") => monitor_pause = true,
                            _ => {}
                        }
                    }
                }

                if !result.success {
                    level_failed = true;
                    failed_ids.insert(node.id.clone());
                }

                ctx.lock().await.commit(node.id.to_string(), result);
            }

            if monitor_abort {
                status = RunStatus::Cancelled;
                abort_reason = Some("monitor node triggered abort".to_owned());
                break 'levels;
            }
            if monitor_pause {
                status = RunStatus::Paused;
                break 'levels;
            }

            if let Some(budget) = self.config.max_tokens {
                let consumed = cost.lock().await.total_tokens;
                if consumed > budget {
                    status = RunStatus::Aborted;
                    abort_reason = Some(EngineError::TokenBudgetExceeded { budget, consumed }.to_string());
                    break 'levels;
                }
            }
            if let Some(budget_usd) = self.config.org_budget_usd {
                let spent = cost.lock().await.total_cost_usd;
                if spent > budget_usd {
                    status = RunStatus::Aborted;
                    abort_reason = Some(EngineError::CostBudgetExceeded { budget_usd, spent_usd: spent }.to_string());
                    break 'levels;
                }
            }
            if level_failed {
                match self.config.failure_policy {
                    FailurePolicy::Halt => {
                        status = RunStatus::Failed;
                        break 'levels;
                    }
                    FailurePolicy::ContinuePossible => {
                        // Dependents of a failed node are excluded from
                        // `current_skip` on the next iteration; unrelated
                        // branches in later levels still dispatch.
                    }
                    FailurePolicy::Always => {
                        // Every remaining level still dispatches; a
                        // dependent of a failed node resolves its missing
                        // input via `ContextError::UnresolvedPath` and
                        // fails on its own.
                    }
                }
            }

            self.event_bus
                .publish(ExecutionEvent::LevelCompleted {
                    run_id: run_id.to_string(),
                    level: level_index,
                    timestamp: chrono::Utc::now(),
                })
                .await?;

            if let Some(interval) = self.config.checkpoint_interval_seconds {
                if last_checkpoint.elapsed().as_secs() >= interval {
                    let snapshot = {
                        let locked = ctx.lock().await;
                        serde_json::to_value(locked.all_results()).unwrap_or(Value::Null)
                    };
                    self.event_bus
                        .publish(ExecutionEvent::DebugContextSnapshot {
                            run_id: run_id.to_string(),
                            snapshot,
                            timestamp: chrono::Utc::now(),
                        })
                        .await?;
                    last_checkpoint = std::time::Instant::now();
                }
            }
        }

        let final_ctx = ctx.lock().await;
        let final_cost = *cost.lock().await;

        if status == RunStatus::Completed && !final_ctx_all_succeeded(&final_ctx) {
            status = RunStatus::Failed;
        }

        match status {
            RunStatus::Completed => {
                self.event_bus
                    .publish(ExecutionEvent::WorkflowCompleted {
                        run_id: run_id.to_string(),
                        timestamp: chrono::Utc::now(),
                    })
                    .await?;
            }
            RunStatus::Failed | RunStatus::Aborted => {
                self.event_bus
                    .publish(ExecutionEvent::WorkflowFailed {
                        run_id: run_id.to_string(),
                        error: abort_reason.clone().unwrap_or_else(|| format!("run ended with status {status:?}")),
                        timestamp: chrono::Utc::now(),
                    })
                    .await?;
            }
            RunStatus::Cancelled => {
                if let Some(reason) = &abort_reason {
                    self.event_bus
                        .publish(ExecutionEvent::WorkflowFailed {
                            run_id: run_id.to_string(),
                            error: reason.clone(),
                            timestamp: chrono::Utc::now(),
                        })
                        .await?;
                }
            }
            RunStatus::Paused => {}
        }

        Ok(RunSummary {
            run_id,
            blueprint_id: blueprint.blueprint_id,
            status,
            node_results: final_ctx.all_results(),
            skipped_node_ids: skipped_ids,
            cost: final_cost,
        })
    }
}

fn final_ctx_all_succeeded(ctx: &ExecutionContext) -> bool {
    ctx.all_results().values().all(|result| result.success)
}

fn node_scoped_context(ctx: &ExecutionContext, node: &NodeSpec) -> Result<ExecutionContext, ContextError> {
    if node.input_mappings.is_empty() {
        return Ok(ctx.clone());
    }
    let mappings: BTreeMap<String, ice_context::InputMapping> = node
        .input_mappings
        .iter()
        .map(|(field, mapping)| {
            (
                field.clone(),
                ice_context::InputMapping {
                    source_node_id: mapping.source_node_id.to_string(),
                    source_output_path: mapping.source_output_path.clone(),
                },
            )
        })
        .collect();
    let resolved = ctx.resolve_inputs(&mappings)?;
    Ok(ctx.with_extra_globals(resolved))
}

fn extract_usage(output: &Value) -> Option<UsageMetadata> {
    output
        .get("usage")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}
