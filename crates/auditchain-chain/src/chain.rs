//! Hash-chain primitives: linking one event's hash to the next.
//!
//! Hash input layout (bytes, in order):
//!   1. canonical bytes of the enriched event, chain fields stripped
//!   2. a single `0x00` separator byte
//!   3. the previous head hash, as raw 32 bytes (not hex)
//!
//! The separator prevents concatenation ambiguity between the end of the
//! canonical JSON and the start of the previous hash — without it, two
//! different (canonical_bytes, prev_hash) pairs could in principle produce
//! the same concatenation if one ends where hex digits of the other begin.

use auditchain_model::chain::ChainState;
use auditchain_model::event::{AnnotatedEvent, EnrichedEvent};
use sha2::{Digest, Sha256};

use crate::canonical::{canonicalize, CanonicalError};

const SEPARATOR: u8 = 0x00;

/// Compute the next link in the chain for a single enriched event.
///
/// Returns `(hash_prev_hex, hash_hex)`. Does not mutate `state`; the caller
/// advances it after successfully emitting the annotated event.
pub fn link(event: &EnrichedEvent, state: &ChainState) -> Result<(String, String), CanonicalError> {
    let canonical_bytes = canonicalize(event)?;
    let prev_head_bytes = hex::decode(&state.last_head_hash)
        .map_err(|e| CanonicalError::InvalidHeadHash(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical_bytes);
    hasher.update([SEPARATOR]);
    hasher.update(&prev_head_bytes);
    let digest = hasher.finalize();

    Ok((state.last_head_hash.clone(), hex::encode(digest)))
}

/// Thread a stream of enriched events through the chain, annotating each and
/// advancing state after every successful link.
///
/// Implements the `compute(readStream, writeStream, state) -> (newState, count)`
/// contract: `events` stands in for the read stream, `sink` for the write
/// stream. The chain engine is the pipeline's serialisation point — events
/// are linked strictly in iteration order.
pub fn compute<I, F>(
    events: I,
    mut state: ChainState,
    mut sink: F,
) -> Result<(ChainState, u64), CanonicalError>
where
    I: IntoIterator<Item = EnrichedEvent>,
    F: FnMut(AnnotatedEvent) -> Result<(), CanonicalError>,
{
    let mut count = 0u64;
    for event in events {
        let (hash_prev, hash) = link(&event, &state)?;
        let hash_chain_index = state.last_chain_index + 1;

        state.last_chain_index = hash_chain_index;
        state.last_head_hash = hash.clone();

        sink(AnnotatedEvent {
            enriched: event,
            hash_prev,
            hash,
            hash_chain_index,
        })?;
        count += 1;
    }
    Ok((state, count))
}
