//! `/ws/mcp/`: bidirectional WebSocket gateway.
//!
//! Authentication happens during the handshake via the
//! `Sec-WebSocket-Protocol` header carrying the bearer token (ported from
//! `ws_gateway.py`'s subprotocol auth). Inbound frames are validated
//! against one of three message shapes before being accepted; outbound
//! frames always carry an opaque `mid` and a monotonic `ts`.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::AppState;

/// One of the three shapes `ws_gateway.py` accepts from a client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Propose changing one field of one node.
    PatchNode {
        node_id: String,
        field: String,
        value: Value,
    },
    /// Report observed latency/cost for a node.
    Telemetry {
        node_id: String,
        latency_ms: f64,
        cost: f64,
    },
    /// Report a user's cursor position on the authoring canvas.
    Cursor { user: String, x: f64, y: f64 },
}

/// Every outbound frame, tagged with an opaque message id and a monotonic
/// timestamp so clients can order and deduplicate them.
#[derive(Debug, Serialize)]
pub struct OutboundMessage {
    pub mid: u64,
    pub ts: u64,
    #[serde(flatten)]
    pub body: Value,
}

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(1);
static CLOCK_TICK: AtomicU64 = AtomicU64::new(0);

fn next_outbound(body: Value) -> OutboundMessage {
    OutboundMessage {
        mid: MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed),
        ts: CLOCK_TICK.fetch_add(1, Ordering::Relaxed),
        body,
    }
}

pub async fn upgrade(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    ws: WebSocketUpgrade,
) -> axum::response::Response {
    let protocol = headers
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok());
    let token = crate::auth::token_from_ws_protocol(protocol);

    if token != Some(state.bearer_token.as_ref()) {
        return axum::http::StatusCode::UNAUTHORIZED.into_response();
    }

    ws.protocols([state.bearer_token.to_string()])
        .on_upgrade(handle_socket)
}

async fn handle_socket(mut socket: WebSocket) {
    loop {
        let Some(Ok(message)) = socket.recv().await else {
            return;
        };
        let Message::Text(text) = message else {
            continue;
        };

        let outcome: Result<InboundMessage, serde_json::Error> = serde_json::from_str(&text);
        let response = match outcome {
            Ok(InboundMessage::PatchNode { node_id, field, value }) => {
                tracing::debug!(node_id, field, "patch_node accepted");
                serde_json::json!({"accepted": "patch_node", "node_id": node_id, "field": field, "value": value})
            }
            Ok(InboundMessage::Telemetry {
                node_id,
                latency_ms,
                cost,
            }) => {
                tracing::debug!(node_id, latency_ms, cost, "telemetry accepted");
                serde_json::json!({"accepted": "telemetry", "node_id": node_id})
            }
            Ok(InboundMessage::Cursor { user, x, y }) => {
                serde_json::json!({"accepted": "cursor", "user": user, "x": x, "y": y})
            }
            Err(err) => serde_json::json!({"rejected": err.to_string()}),
        };

        let outbound = next_outbound(response);
        let Ok(payload) = serde_json::to_string(&outbound) else {
            continue;
        };
        if socket.send(Message::Text(payload.into())).await.is_err() {
            return;
        }
    }
}
