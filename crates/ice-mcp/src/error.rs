use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced across the MCP HTTP and WebSocket surface.
#[derive(Debug, Error)]
pub enum McpError {
    /// The request carried no `Authorization: Bearer ...` header, or the
    /// token did not match the configured one.
    #[error("unauthorized")]
    Unauthorized,
    /// The caller exceeded the per-(token, route) request budget.
    #[error("rate limit exceeded")]
    RateLimited,
    /// The request body failed blueprint or run-request validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The referenced blueprint or run does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A mutating draft request was rejected by the optimistic lock.
    #[error(transparent)]
    DraftStore(#[from] ice_draftstore::DraftStoreError),
    /// The workflow engine failed to execute the run.
    #[error(transparent)]
    Engine(#[from] ice_engine::EngineError),
    /// The blueprint failed graph or schema validation.
    #[error("blueprint rejected: {0:?}")]
    Validation(Vec<ice_blueprint::ValidationError>),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for McpError {
    fn into_response(self) -> Response {
        let status = match &self {
            McpError::Unauthorized => StatusCode::UNAUTHORIZED,
            McpError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            McpError::InvalidRequest(_) | McpError::Validation(_) => StatusCode::BAD_REQUEST,
            McpError::NotFound(_) => StatusCode::NOT_FOUND,
            McpError::DraftStore(err) => {
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            McpError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
