//! Shared application state for the MCP control plane.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ice_blueprint::Blueprint;
use ice_core::{BlueprintId, RunId};
use ice_draftstore::{DraftStore, RateLimiter};
use ice_engine::{EngineConfig, RunSummary, WorkflowEngine};
use ice_eventbus::EventBus;
use ice_executor::Dispatcher;
use ice_registry::Registry;

/// The outcome of one `/mcp/runs` execution, tracked until a client polls
/// or streams it.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// The blueprint this run executed.
    pub blueprint_id: BlueprintId,
    /// When the run was accepted.
    pub start_time: DateTime<Utc>,
    /// When the run finished, if it has.
    pub end_time: Option<DateTime<Utc>>,
    /// The final summary, once execution completes.
    pub summary: Option<RunSummary>,
}

/// Everything a request handler needs: the bearer token to check requests
/// against, the registry-backed dispatcher and engine used to run
/// blueprints, the event bus for SSE/WebSocket fanout, the draft store,
/// and the in-memory blueprint/run tables.
#[derive(Clone)]
pub struct AppState {
    /// The single token every request must present.
    pub bearer_token: Arc<str>,
    /// Resolves tool/agent/chain references for node execution.
    pub registry: Arc<Registry>,
    /// Dispatches individual node executions.
    pub dispatcher: Dispatcher,
    /// Fan-out for `ExecutionEvent`s, also read back for SSE replay.
    pub event_bus: Arc<EventBus>,
    /// Default engine configuration for runs that don't override it.
    pub engine_config: EngineConfig,
    /// Session-keyed draft persistence.
    pub draft_store: Arc<dyn DraftStore>,
    /// Per-(token, route) request budget shared by every route.
    pub rate_limiter: Arc<RateLimiter>,
    /// Blueprints accepted via `POST /mcp/blueprints`, keyed by id.
    pub blueprints: Arc<DashMap<String, Blueprint>>,
    /// Runs accepted via `POST /mcp/runs`, keyed by id.
    pub runs: Arc<DashMap<String, RunRecord>>,
}

impl AppState {
    /// Build application state around a populated registry and event bus.
    #[must_use]
    pub fn new(
        bearer_token: impl Into<Arc<str>>,
        registry: Arc<Registry>,
        event_bus: Arc<EventBus>,
        engine_config: EngineConfig,
        draft_store: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            dispatcher: Dispatcher::new(Arc::clone(&registry), Arc::clone(&event_bus)),
            registry,
            event_bus,
            engine_config,
            draft_store,
            rate_limiter: Arc::new(RateLimiter::default()),
            blueprints: Arc::new(DashMap::new()),
            runs: Arc::new(DashMap::new()),
        }
    }

    /// A `WorkflowEngine` over the current dispatcher, event bus, and
    /// engine configuration.
    #[must_use]
    pub fn engine(&self) -> WorkflowEngine {
        WorkflowEngine::new(
            self.dispatcher.clone(),
            Arc::clone(&self.event_bus),
            self.engine_config.clone(),
        )
    }
}

/// Format a `RunId` the way route handlers key their tables and URLs.
#[must_use]
pub fn run_key(run_id: RunId) -> String {
    run_id.to_string()
}
