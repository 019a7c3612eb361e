//! `POST /api/v1/mcp/runs`, `GET /api/v1/mcp/runs/{run_id}`, and the SSE
//! event stream at `GET /api/v1/mcp/runs/{run_id}/events`.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use ice_blueprint::Blueprint;
use ice_core::RunId;
use ice_eventbus::ExecutionEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::McpError;
use crate::state::{run_key, AppState, RunRecord};

#[derive(Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub max_parallel: Option<usize>,
}

#[derive(Deserialize)]
pub struct RunRequest {
    pub blueprint_id: Option<String>,
    pub blueprint: Option<Blueprint>,
    #[serde(default)]
    pub options: Option<RunOptions>,
}

#[derive(Serialize)]
pub struct RunAck {
    run_id: String,
    status_endpoint: String,
    events_endpoint: String,
}

pub async fn start_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<RunAck>), McpError> {
    let blueprint = resolve_blueprint(&state, request.blueprint_id, request.blueprint)?;

    let mut config = state.engine_config;
    if let Some(options) = request.options {
        if let Some(max_parallel) = options.max_parallel {
            if !(1..=20).contains(&max_parallel) {
                return Err(McpError::InvalidRequest(
                    "options.max_parallel must be between 1 and 20".to_owned(),
                ));
            }
            config.max_parallel = max_parallel;
        }
    }

    let run_id = RunId::v4();
    let key = run_key(run_id);
    state.runs.insert(
        key.clone(),
        RunRecord {
            blueprint_id: blueprint.blueprint_id,
            start_time: Utc::now(),
            end_time: None,
            summary: None,
        },
    );

    let engine = ice_engine::WorkflowEngine::new(state.dispatcher.clone(), state.event_bus.clone(), config);
    let runs = state.runs.clone();
    let key_for_task = key.clone();
    tokio::spawn(async move {
        let summary = engine
            .execute(&blueprint, run_id, BTreeMap::new(), CancellationToken::new())
            .await;
        if let Some(mut record) = runs.get_mut(&key_for_task) {
            record.end_time = Some(Utc::now());
            record.summary = summary.ok();
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RunAck {
            run_id: key.clone(),
            status_endpoint: format!("/api/v1/mcp/runs/{key}"),
            events_endpoint: format!("/api/v1/mcp/runs/{key}/events"),
        }),
    ))
}

fn resolve_blueprint(
    state: &AppState,
    blueprint_id: Option<String>,
    blueprint: Option<Blueprint>,
) -> Result<Blueprint, McpError> {
    match (blueprint_id, blueprint) {
        (Some(_), Some(_)) | (None, None) => Err(McpError::InvalidRequest(
            "exactly one of blueprint_id or blueprint must be set".to_owned(),
        )),
        (Some(id), None) => state
            .blueprints
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| McpError::NotFound(format!("blueprint {id}"))),
        (None, Some(blueprint)) => {
            let report = ice_blueprint::validate(&blueprint.schema_version, &blueprint.nodes);
            if report.errors.is_empty() {
                Ok(blueprint)
            } else {
                Err(McpError::Validation(report.errors))
            }
        }
    }
}

#[derive(Deserialize)]
pub struct WaitQuery {
    #[serde(default)]
    pub wait: bool,
}

#[derive(Serialize)]
pub struct RunResult {
    run_id: String,
    success: bool,
    start_time: chrono::DateTime<Utc>,
    end_time: chrono::DateTime<Utc>,
    output: BTreeMap<String, Value>,
    error: Option<String>,
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(_query): Query<WaitQuery>,
) -> Result<axum::response::Response, McpError> {
    let record = state
        .runs
        .get(&run_id)
        .ok_or_else(|| McpError::NotFound(format!("run {run_id}")))?;

    let Some(end_time) = record.end_time else {
        return Ok(StatusCode::ACCEPTED.into_response());
    };
    let summary = record
        .summary
        .as_ref()
        .ok_or_else(|| McpError::NotFound(format!("run {run_id} result")))?;

    let output = summary
        .node_results
        .iter()
        .filter_map(|(id, result)| result.output.clone().map(|value| (id.clone(), value)))
        .collect();
    let error = summary
        .node_results
        .values()
        .find_map(|result| result.error.clone());

    Ok(Json(RunResult {
        run_id,
        success: summary.all_succeeded(),
        start_time: record.start_time,
        end_time,
        output,
        error,
    })
    .into_response())
}

pub async fn stream_run_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let cursor: usize = headers
        .get("Last-Event-ID")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    let history = match state.event_bus.sink() {
        Some(sink) => sink.history(&run_id).await.unwrap_or_default(),
        None => Vec::new(),
    };
    let backlog: Vec<ExecutionEvent> = history.into_iter().skip(cursor).collect();

    let live = state.event_bus.subscribe();
    let run_id_filter = run_id.clone();
    let live_stream = stream::unfold(live, move |mut subscriber| {
        let run_id_filter = run_id_filter.clone();
        async move {
            loop {
                match subscriber.recv().await {
                    Ok(event) if event.run_id() == run_id_filter.as_str() => {
                        return Some((event, subscriber));
                    }
                    Ok(_) => continue,
                    Err(_) => return None,
                }
            }
        }
    });

    let backlog_len = backlog.len();
    let backlog_stream =
        stream::iter(backlog.into_iter().enumerate().map(move |(i, event)| (cursor + i, event)));

    let numbered_live = live_stream.scan(cursor + backlog_len, |id, event| {
        let this_id = *id;
        *id += 1;
        std::future::ready(Some((this_id, event)))
    });

    let events = backlog_stream.chain(numbered_live).map(|(id, event)| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_owned());
        Ok(Event::default().id(id.to_string()).data(data))
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
