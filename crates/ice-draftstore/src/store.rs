//! `DraftStore`: session-keyed draft persistence, grounded on
//! `drafts.py`'s `InMemoryDraftStore`/`RedisDraftStore` pair.

use async_trait::async_trait;
use ice_blueprint::Draft;

use crate::error::DraftStoreError;

/// Loads and saves drafts by session id.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Load the draft for `session_id`, if one exists.
    async fn load(&self, session_id: &str) -> Result<Option<Draft>, DraftStoreError>;

    /// Persist `draft` under `session_id`, creating it if absent.
    async fn save(&self, session_id: &str, draft: Draft) -> Result<(), DraftStoreError>;
}

/// An in-memory store, useful for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    drafts: dashmap::DashMap<String, Draft>,
}

impl InMemoryDraftStore {
    /// Build an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn load(&self, session_id: &str) -> Result<Option<Draft>, DraftStoreError> {
        Ok(self.drafts.get(session_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, session_id: &str, draft: Draft) -> Result<(), DraftStoreError> {
        self.drafts.insert(session_id.to_owned(), draft);
        Ok(())
    }
}

/// A Redis-backed store, keyed by `draft:{session_id}`, serialized as JSON.
#[cfg(feature = "redis")]
#[derive(Debug, Clone)]
pub struct RedisDraftStore {
    client: redis::Client,
}

#[cfg(feature = "redis")]
impl RedisDraftStore {
    /// Build a store against a Redis connection string (`redis://...`).
    pub fn new(redis_url: &str) -> Result<Self, DraftStoreError> {
        let client =
            redis::Client::open(redis_url).map_err(|err| DraftStoreError::Backend(err.to_string()))?;
        Ok(Self { client })
    }

    fn key(session_id: &str) -> String {
        format!("draft:{session_id}")
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl DraftStore for RedisDraftStore {
    async fn load(&self, session_id: &str) -> Result<Option<Draft>, DraftStoreError> {
        use redis::AsyncCommands;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| DraftStoreError::Backend(err.to_string()))?;
        let raw: Option<String> = conn
            .get(Self::key(session_id))
            .await
            .map_err(|err| DraftStoreError::Backend(err.to_string()))?;
        raw.map(|json| {
            serde_json::from_str(&json).map_err(|err| DraftStoreError::Backend(err.to_string()))
        })
        .transpose()
    }

    async fn save(&self, session_id: &str, draft: Draft) -> Result<(), DraftStoreError> {
        use redis::AsyncCommands;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| DraftStoreError::Backend(err.to_string()))?;
        let json = serde_json::to_string(&draft)
            .map_err(|err| DraftStoreError::Backend(err.to_string()))?;
        let _: () = conn
            .set(Self::key(session_id), json)
            .await
            .map_err(|err| DraftStoreError::Backend(err.to_string()))?;
        Ok(())
    }
}
