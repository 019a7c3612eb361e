//! Optimistic concurrency over a draft's SHA-256 version lock, grounded on
//! `drafts.py`'s `_require_match_version`: a mutating request with no
//! `X-Version-Lock` header is rejected as 428, a stale one as 409.

use ice_blueprint::Draft;

use crate::error::DraftStoreError;

/// Check a client-supplied version lock against the draft's current one.
pub fn require_matching_lock(
    client_lock: Option<&str>,
    draft: &Draft,
) -> Result<(), DraftStoreError> {
    let Some(client_lock) = client_lock else {
        return Err(DraftStoreError::MissingVersionLock);
    };
    let server_lock = draft.compute_version_lock();
    if client_lock != server_lock {
        return Err(DraftStoreError::VersionConflict {
            client: client_lock.to_owned(),
            server: server_lock,
        });
    }
    Ok(())
}
