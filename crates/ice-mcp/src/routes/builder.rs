//! `/api/v1/builder/{suggest,propose,apply}` — an additional surface over
//! blueprint mutation proposals, grounded on
//! `original_source/src/ice_api/api/builder_mcp.py`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ice_blueprint::{Blueprint, NodeSpec};
use serde::{Deserialize, Serialize};

use crate::error::McpError;
use crate::state::AppState;

/// Estimates the dollar cost of running a blueprint, without executing it.
///
/// `original_source`'s `builder_mcp.py` wires this to a per-model pricing
/// table; here it is a pluggable port so a caller can swap in a real
/// pricing source without touching the route handlers.
pub trait CostEstimator: Send + Sync {
    /// Rough cost estimate in USD for one run of `blueprint`.
    fn estimate(&self, blueprint: &Blueprint) -> f64;
}

/// A flat per-node estimate, used until a real pricing table is wired in.
#[derive(Debug, Clone, Copy)]
pub struct GenericCostEstimator {
    /// Assumed dollar cost per node.
    pub per_node_usd: f64,
}

impl Default for GenericCostEstimator {
    fn default() -> Self {
        Self { per_node_usd: 0.01 }
    }
}

impl CostEstimator for GenericCostEstimator {
    fn estimate(&self, blueprint: &Blueprint) -> f64 {
        blueprint.nodes.len() as f64 * self.per_node_usd
    }
}

#[derive(Deserialize)]
pub struct SuggestRequest {
    pub blueprint: Blueprint,
    pub prompt: String,
}

#[derive(Serialize)]
pub struct SuggestResponse {
    pub prompt: String,
    pub node_count: usize,
    pub estimated_cost_usd: f64,
}

pub async fn suggest(Json(request): Json<SuggestRequest>) -> Json<SuggestResponse> {
    let estimator = GenericCostEstimator::default();
    Json(SuggestResponse {
        estimated_cost_usd: estimator.estimate(&request.blueprint),
        node_count: request.blueprint.nodes.len(),
        prompt: request.prompt,
    })
}

#[derive(Deserialize)]
pub struct ProposeRequest {
    pub blueprint: Blueprint,
    pub add_node: NodeSpec,
    /// Skip policy checks that would otherwise reject a proposal touching
    /// a locked node. Off by default; set only by an operator override.
    #[serde(default)]
    pub allow_policy_override: bool,
}

#[derive(Serialize)]
pub struct ProposeResponse {
    pub blueprint: Blueprint,
    pub estimated_cost_usd: f64,
}

pub async fn propose(
    State(_state): State<AppState>,
    Json(request): Json<ProposeRequest>,
) -> Result<Json<ProposeResponse>, McpError> {
    if request.blueprint.nodes.iter().any(|n| n.id == request.add_node.id) && !request.allow_policy_override {
        return Err(McpError::InvalidRequest(format!(
            "node {:?} already exists; set allow_policy_override to replace it",
            request.add_node.id
        )));
    }

    let mut nodes = request.blueprint.nodes.clone();
    nodes.retain(|n| n.id != request.add_node.id);
    nodes.push(request.add_node);

    let blueprint = Blueprint::try_new(
        request.blueprint.schema_version.clone(),
        request.blueprint.blueprint_id,
        nodes,
        request.blueprint.metadata.clone(),
    )
    .map_err(McpError::Validation)?;

    let estimator = GenericCostEstimator::default();
    Ok(Json(ProposeResponse {
        estimated_cost_usd: estimator.estimate(&blueprint),
        blueprint,
    }))
}

#[derive(Deserialize)]
pub struct ApplyRequest {
    pub blueprint: Blueprint,
}

pub async fn apply(
    State(state): State<AppState>,
    Json(request): Json<ApplyRequest>,
) -> Result<StatusCode, McpError> {
    let report = ice_blueprint::validate(&request.blueprint.schema_version, &request.blueprint.nodes);
    if !report.errors.is_empty() {
        return Err(McpError::Validation(report.errors));
    }
    state
        .blueprints
        .insert(request.blueprint.blueprint_id.to_string(), request.blueprint);
    Ok(StatusCode::NO_CONTENT)
}
