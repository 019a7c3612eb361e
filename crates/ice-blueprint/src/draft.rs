//! Draft authoring state and its SHA-256 optimistic-concurrency lock.
//!
//! Grounded on `original_source/src/ice_api/api/drafts.py`'s
//! `_calculate_version_lock`/`_require_match_version`: the lock is a
//! SHA-256 digest of the draft's canonical (sorted-key) JSON with the lock
//! field itself excluded, so any mutation changes the digest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::blueprint::Blueprint;

/// A `(x, y)` authoring-canvas position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    /// Horizontal canvas position.
    pub x: f64,
    /// Vertical canvas position.
    pub y: f64,
}

/// In-progress authoring state for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Successive natural-language prompts that shaped this draft.
    #[serde(default)]
    pub prompt_history: Vec<String>,
    /// Successive rendered mermaid diagrams, newest last.
    #[serde(default)]
    pub mermaid_versions: Vec<String>,
    /// Node ids the author has pinned and the assistant must not move.
    #[serde(default)]
    pub locked_nodes: Vec<String>,
    /// Canvas position per node id.
    #[serde(default)]
    pub node_positions: BTreeMap<String, NodePosition>,
    /// Free-form session metadata.
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
    /// The most recently finalized blueprint snapshot, if any.
    #[serde(default)]
    pub last_blueprint: Option<Blueprint>,
}

/// A `Draft` paired with the lock computed at load time, so callers can
/// both read the draft and quote its lock back on the next mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct LockedDraft {
    /// The draft contents.
    pub draft: Draft,
    /// Hex-encoded SHA-256 over the draft's canonical JSON.
    pub version_lock: String,
}

impl Draft {
    /// Compute the version lock: SHA-256 over this draft's canonical JSON
    /// representation, hex-encoded.
    ///
    /// Canonical here means "serde_json's own key ordering", which for a
    /// `BTreeMap`-backed struct is already sorted; this is sufficient
    /// because `Draft` contains no `HashMap` fields whose iteration order
    /// would vary between calls.
    #[must_use]
    pub fn compute_version_lock(&self) -> String {
        let canonical = serde_json::to_vec(self).expect("Draft always serializes");
        let digest = Sha256::digest(&canonical);
        hex::encode(digest)
    }

    /// Wrap this draft with its freshly computed lock.
    #[must_use]
    pub fn with_lock(self) -> LockedDraft {
        let version_lock = self.compute_version_lock();
        LockedDraft { draft: self, version_lock }
    }
}
