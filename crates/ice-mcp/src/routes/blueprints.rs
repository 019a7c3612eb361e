//! `POST /api/v1/mcp/blueprints`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ice_blueprint::{validate, Blueprint};
use serde::Serialize;

use crate::error::McpError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BlueprintAck {
    blueprint_id: String,
    status: &'static str,
}

pub async fn accept_blueprint(
    State(state): State<AppState>,
    Json(blueprint): Json<Blueprint>,
) -> Result<(StatusCode, Json<BlueprintAck>), McpError> {
    let report = validate(&blueprint.schema_version, &blueprint.nodes);
    if !report.errors.is_empty() {
        return Err(McpError::Validation(report.errors));
    }

    let key = blueprint.blueprint_id.to_string();
    let status = if state.blueprints.contains_key(&key) {
        "updated"
    } else {
        "accepted"
    };
    state.blueprints.insert(key.clone(), blueprint);

    Ok((
        StatusCode::CREATED,
        Json(BlueprintAck {
            blueprint_id: key,
            status,
        }),
    ))
}
