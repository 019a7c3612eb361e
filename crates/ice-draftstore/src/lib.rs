//! Draft persistence for the iceOS authoring API: session-keyed storage,
//! optimistic version-locking, and per-route rate limiting.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod lock;
mod rate_limit;
mod store;

pub use error::DraftStoreError;
pub use lock::require_matching_lock;
pub use rate_limit::RateLimiter;
pub use store::{DraftStore, InMemoryDraftStore};

#[cfg(feature = "redis")]
pub use store::RedisDraftStore;
