//! Chain state and checkpoint records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Zero hash used as `hash_prev` for the first event of a fresh chain, and
/// as the coerced value of an empty `LastHeadHash` field in a state file.
pub fn zero_hash() -> String {
    "0".repeat(64)
}

/// Resumable chain position: the index and head hash a run left off at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    #[serde(rename = "LastChainIndex")]
    pub last_chain_index: u64,
    #[serde(rename = "LastHeadHash")]
    pub last_head_hash: String,
}

impl Default for ChainState {
    fn default() -> Self {
        ChainState {
            last_chain_index: 0,
            last_head_hash: zero_hash(),
        }
    }
}

impl ChainState {
    /// Normalise an empty head hash (as produced by a hand-edited state file)
    /// to the canonical zero hash rather than treating it as an error.
    pub fn normalised(mut self) -> Self {
        if self.last_head_hash.is_empty() {
            self.last_head_hash = zero_hash();
        }
        self
    }
}

/// The unsigned body of a checkpoint: a claim about chain position at a point
/// in time. Signed in its canonical form by the checkpointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointBody {
    pub chain_index: u64,
    pub head_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Algorithm identifier written into a signed checkpoint file. Readers must
/// reject any value other than this one; it is informational only, never a
/// negotiated parameter.
pub const CHECKPOINT_ALGORITHM: &str = "ECDSA-P256-SHA256";

/// A checkpoint body plus its detached signature, as persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedCheckpoint {
    pub checkpoint: CheckpointBody,
    pub signature: String,
    pub algorithm: String,
}
