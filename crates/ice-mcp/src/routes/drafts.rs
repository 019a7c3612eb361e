//! `/api/v1/drafts/{session_id}` and its sub-routes.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use ice_blueprint::{Draft, NodePosition};
use serde::Deserialize;
use serde_json::Value;

use crate::error::McpError;
use crate::state::AppState;

fn version_lock_header(headers: &HeaderMap) -> Option<&str> {
    headers.get("X-Version-Lock").and_then(|value| value.to_str().ok())
}

async fn load_or_default(state: &AppState, session_id: &str) -> Result<Draft, McpError> {
    Ok(state.draft_store.load(session_id).await?.unwrap_or_default())
}

pub async fn create_or_get_draft(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Draft>, McpError> {
    let draft = load_or_default(&state, &session_id).await?;
    state.draft_store.save(&session_id, draft.clone()).await?;
    Ok(Json(draft))
}

pub async fn get_draft(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Draft>, McpError> {
    state
        .draft_store
        .load(&session_id)
        .await?
        .map(Json)
        .ok_or_else(|| McpError::NotFound(format!("draft {session_id}")))
}

#[derive(Deserialize)]
pub struct LockNodeRequest {
    pub node_id: String,
}

pub async fn lock_node(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<LockNodeRequest>,
) -> Result<(StatusCode, Json<Draft>), McpError> {
    let mut draft = state
        .draft_store
        .load(&session_id)
        .await?
        .ok_or_else(|| McpError::NotFound(format!("draft {session_id}")))?;
    ice_draftstore::require_matching_lock(version_lock_header(&headers), &draft)?;

    if !draft.locked_nodes.contains(&request.node_id) {
        draft.locked_nodes.push(request.node_id);
    }
    state.draft_store.save(&session_id, draft.clone()).await?;
    Ok((StatusCode::OK, Json(draft)))
}

#[derive(Deserialize)]
pub struct UpdatePositionRequest {
    pub node_id: String,
    pub position: NodePosition,
}

pub async fn update_position(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdatePositionRequest>,
) -> Result<(StatusCode, Json<Draft>), McpError> {
    let mut draft = state
        .draft_store
        .load(&session_id)
        .await?
        .ok_or_else(|| McpError::NotFound(format!("draft {session_id}")))?;
    ice_draftstore::require_matching_lock(version_lock_header(&headers), &draft)?;

    draft.node_positions.insert(request.node_id, request.position);
    state.draft_store.save(&session_id, draft.clone()).await?;
    Ok((StatusCode::OK, Json(draft)))
}

#[derive(Deserialize)]
pub struct InstantiateNodeRequest {
    pub node_id: String,
    #[serde(default)]
    pub config: Value,
}

pub async fn instantiate_node(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<InstantiateNodeRequest>,
) -> Result<(StatusCode, Json<Draft>), McpError> {
    let mut draft = state
        .draft_store
        .load(&session_id)
        .await?
        .ok_or_else(|| McpError::NotFound(format!("draft {session_id}")))?;
    ice_draftstore::require_matching_lock(version_lock_header(&headers), &draft)?;

    draft.meta.insert(request.node_id, request.config);
    state.draft_store.save(&session_id, draft.clone()).await?;
    Ok((StatusCode::OK, Json(draft)))
}
