//! Bearer-token authentication shared by the HTTP and WebSocket surfaces.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::McpError;
use crate::state::AppState;

/// Reject any request whose `Authorization: Bearer <token>` does not match
/// the server's configured token, then apply the shared per-(token, route)
/// rate limit.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, McpError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let Some(token) = token else {
        return Err(McpError::Unauthorized);
    };
    if token != state.bearer_token.as_ref() {
        return Err(McpError::Unauthorized);
    }

    state.rate_limiter.check(token, request.uri().path())?;
    Ok(next.run(request).await)
}

/// Extract the bearer token from the `Sec-WebSocket-Protocol` header, per
/// the WebSocket gateway's subprotocol-based auth handshake.
#[must_use]
pub fn token_from_ws_protocol(header_value: Option<&str>) -> Option<&str> {
    header_value.map(str::trim).filter(|value| !value.is_empty())
}
