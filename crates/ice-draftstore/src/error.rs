use thiserror::Error;

/// Errors raised while loading, saving, or gating access to a draft.
#[derive(Debug, Error)]
pub enum DraftStoreError {
    /// No draft exists under this session id.
    #[error("draft {0:?} not found")]
    NotFound(String),
    /// A mutating request carried no `X-Version-Lock` header.
    #[error("missing X-Version-Lock header")]
    MissingVersionLock,
    /// The client's version lock did not match the server's current one.
    #[error("draft version conflict: client sent {client:?}, server has {server:?}")]
    VersionConflict {
        /// The lock the client supplied.
        client: String,
        /// The lock the server currently holds.
        server: String,
    },
    /// The caller exceeded the per-(token, route) request budget.
    #[error("rate limit exceeded")]
    RateLimited,
    /// The backing store (Redis, etc.) returned an error.
    #[error("draft store backend error: {0}")]
    Backend(String),
}

impl DraftStoreError {
    /// The HTTP status an MCP handler should map this error to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            DraftStoreError::NotFound(_) => 404,
            DraftStoreError::MissingVersionLock => 428,
            DraftStoreError::VersionConflict { .. } => 409,
            DraftStoreError::RateLimited => 429,
            DraftStoreError::Backend(_) => 502,
        }
    }
}
