//! Chain verifier: recomputes a hash chain from an annotated stream and
//! reports which events, if any, were tampered with, plus optional
//! checkpoint soundness against a signed checkpoint.

use auditchain_chain::canonical::canonicalize;
use auditchain_chain::checkpoint::signature_is_valid;
use auditchain_model::chain::{ChainState, SignedCheckpoint};
use auditchain_model::event::AnnotatedEvent;
use sha2::{Digest, Sha256};
use tracing::warn;

const SEPARATOR: u8 = 0x00;

/// Overall result of verifying a checkpointed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    TamperDetected,
    CheckpointMismatch,
    ForgedCheckpoint,
}

/// Full verification report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// `event_id` (or ordinal if missing) of every event found tampered.
    pub tampered: Vec<String>,
    /// Final head hash the stream claims, after processing every event.
    pub final_head: String,
    /// Final chain index the stream claims.
    pub final_index: u64,
    /// Set when a checkpoint was supplied: whether its head matched the
    /// stream's final head.
    pub head_match: Option<bool>,
    /// Set when a checkpoint was supplied: whether its signature validated.
    pub signature_valid: Option<bool>,
    pub outcome: Outcome,
}

/// Recompute the expected hash for one event given the running previous head,
/// using the same rule as `auditchain_chain::chain::link`.
fn expected_hash(
    event: &auditchain_model::event::EnrichedEvent,
    prev_head_hash: &str,
) -> Result<String, auditchain_chain::CanonicalError> {
    let canonical_bytes = canonicalize(event)?;
    let prev_head_bytes = hex::decode(prev_head_hash)
        .map_err(|e| auditchain_chain::CanonicalError::InvalidHeadHash(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical_bytes);
    hasher.update([SEPARATOR]);
    hasher.update(&prev_head_bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Verify a stream of annotated events starting from `starting_state`
/// (usually the chain's genesis state for a full-history verification, or a
/// resumed state when verifying only a tail).
///
/// Tamper detection is localised: the running head always advances to the
/// value the stream *claims* (`hash`), not the recomputed one, so a single
/// tampered event does not cascade into false positives for every event
/// after it.
pub fn verify_stream<I>(events: I, starting_state: &ChainState) -> VerificationReport
where
    I: IntoIterator<Item = AnnotatedEvent>,
{
    let mut tampered = Vec::new();
    let mut running_head = starting_state.last_head_hash.clone();
    let mut running_index = starting_state.last_chain_index;

    for (ordinal, annotated) in events.into_iter().enumerate() {
        let event_label = annotated
            .enriched
            .event
            .event_id
            .clone();
        let label = if event_label.is_empty() {
            ordinal.to_string()
        } else {
            event_label
        };

        let recomputed = expected_hash(&annotated.enriched, &running_head);
        let hash_ok = matches!(&recomputed, Ok(h) if *h == annotated.hash);
        let prev_ok = annotated.hash_prev == running_head;
        let index_ok = annotated.hash_chain_index == running_index + 1;

        if !hash_ok || !prev_ok || !index_ok {
            warn!(event_id = %label, "tamper detected");
            tampered.push(label);
        }

        running_head = annotated.hash;
        running_index = annotated.hash_chain_index;
    }

    VerificationReport {
        tampered,
        final_head: running_head,
        final_index: running_index,
        head_match: None,
        signature_valid: None,
        outcome: Outcome::Ok,
    }
    .finalize_without_checkpoint()
}

/// Verify a stream and additionally validate a signed checkpoint against the
/// stream's final head.
pub fn verify_stream_with_checkpoint<I>(
    events: I,
    starting_state: &ChainState,
    checkpoint: &SignedCheckpoint,
    verifying_key: &p256::ecdsa::VerifyingKey,
) -> VerificationReport
where
    I: IntoIterator<Item = AnnotatedEvent>,
{
    let report = verify_stream(events, starting_state);
    let sig_valid = signature_is_valid(checkpoint, verifying_key);
    let head_match = checkpoint.checkpoint.head_hash == report.final_head;

    let outcome = classify(!report.tampered.is_empty(), sig_valid, head_match);

    VerificationReport {
        head_match: Some(head_match),
        signature_valid: Some(sig_valid),
        outcome,
        ..report
    }
}

impl VerificationReport {
    fn finalize_without_checkpoint(self) -> Self {
        let outcome = if self.tampered.is_empty() {
            Outcome::Ok
        } else {
            Outcome::TamperDetected
        };
        VerificationReport { outcome, ..self }
    }
}

/// Outcome precedence when both a checkpoint and a stream are present:
/// any tamper wins over a forged signature, which wins over a head mismatch.
/// This resolves the one ambiguity in the outcome table, where more than one
/// condition could hold simultaneously.
fn classify(has_tampered: bool, sig_valid: bool, head_match: bool) -> Outcome {
    if has_tampered {
        Outcome::TamperDetected
    } else if !sig_valid {
        Outcome::ForgedCheckpoint
    } else if !head_match {
        Outcome::CheckpointMismatch
    } else {
        Outcome::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditchain_chain::chain::compute;
    use auditchain_chain::checkpoint::sign;
    use auditchain_model::event::{DbSystem, Event, EnrichedEvent, RiskLevel};
    use chrono::Utc;
    use p256::ecdsa::{SigningKey, VerifyingKey};
    use rand_core::OsRng;
    use std::collections::BTreeSet;

    fn sample_event(id: &str, msg: &str) -> EnrichedEvent {
        let mut extra = serde_json::Map::new();
        extra.insert("msg".to_string(), serde_json::json!(msg));
        EnrichedEvent {
            event: Event {
                event_id: id.to_string(),
                timestamp: "2025-01-01T00:00:00Z".to_string(),
                db_system: DbSystem::Postgres,
                query_type: "SELECT".to_string(),
                db_user: None,
                db_name: None,
                raw_query: None,
                tables: None,
                columns: None,
                where_present: None,
                row_estimate: None,
                extra,
            },
            categories: BTreeSet::new(),
            risk_level: RiskLevel::Low,
            bulk: false,
            debug: None,
        }
    }

    #[test]
    fn fresh_chain_two_events_verifies_clean() {
        let events = vec![sample_event("e1", "one"), sample_event("e2", "two")];
        let mut out = Vec::new();
        compute(events, ChainState::default(), |ev| {
            out.push(ev);
            Ok(())
        })
        .unwrap();

        assert_eq!(out[0].hash_prev, auditchain_model::chain::zero_hash());

        let report = verify_stream(out, &ChainState::default());
        assert!(report.tampered.is_empty());
        assert_eq!(report.outcome, Outcome::Ok);
    }

    #[test]
    fn tampering_middle_event_is_localised() {
        let events = vec![
            sample_event("e1", "one"),
            sample_event("e2", "two"),
            sample_event("e3", "three"),
        ];
        let mut out = Vec::new();
        compute(events, ChainState::default(), |ev| {
            out.push(ev);
            Ok(())
        })
        .unwrap();

        out[1].enriched.event.extra.insert(
            "msg".to_string(),
            serde_json::json!("tampered"),
        );

        let report = verify_stream(out, &ChainState::default());
        assert_eq!(report.tampered, vec!["e2".to_string()]);
    }

    #[test]
    fn multi_file_continuity_resumes_cleanly() {
        let run_a = vec![sample_event("e1", "a"), sample_event("e2", "b")];
        let mut out_a = Vec::new();
        let (state_a, _) = compute(run_a, ChainState::default(), |ev| {
            out_a.push(ev);
            Ok(())
        })
        .unwrap();

        let run_b = vec![sample_event("e3", "c")];
        let mut out_b = Vec::new();
        compute(run_b, state_a.clone(), |ev| {
            out_b.push(ev);
            Ok(())
        })
        .unwrap();

        let report = verify_stream(out_b, &state_a);
        assert!(report.tampered.is_empty());
        assert_eq!(report.final_index, 3);
    }

    #[test]
    fn checkpoint_mismatch_reports_valid_signature() {
        let signing = SigningKey::random(&mut OsRng);
        let verifying = VerifyingKey::from(&signing);

        let events = vec![sample_event("e1", "one")];
        let mut out = Vec::new();
        let (final_state, _) = compute(events, ChainState::default(), |ev| {
            out.push(ev);
            Ok(())
        })
        .unwrap();

        let mismatched_checkpoint =
            sign(final_state.last_chain_index, &"ff".repeat(32), Utc::now(), &signing).unwrap();

        let report =
            verify_stream_with_checkpoint(out, &ChainState::default(), &mismatched_checkpoint, &verifying);

        assert!(report.tampered.is_empty());
        assert_eq!(report.signature_valid, Some(true));
        assert_eq!(report.head_match, Some(false));
        assert_eq!(report.outcome, Outcome::CheckpointMismatch);
    }

    #[test]
    fn forged_checkpoint_signature_is_detected() {
        let signing = SigningKey::random(&mut OsRng);
        let (_other_signing, other_verifying) = {
            let s = SigningKey::random(&mut OsRng);
            let v = VerifyingKey::from(&s);
            (s, v)
        };

        let events = vec![sample_event("e1", "one")];
        let mut out = Vec::new();
        let (final_state, _) = compute(events, ChainState::default(), |ev| {
            out.push(ev);
            Ok(())
        })
        .unwrap();

        let checkpoint = sign(
            final_state.last_chain_index,
            &final_state.last_head_hash,
            Utc::now(),
            &signing,
        )
        .unwrap();

        let report = verify_stream_with_checkpoint(
            out,
            &ChainState::default(),
            &checkpoint,
            &other_verifying,
        );
        assert_eq!(report.outcome, Outcome::ForgedCheckpoint);
    }

    #[test]
    fn event_with_no_hash_fields_counts_as_tampered() {
        let legit = vec![sample_event("e1", "one")];
        let mut out = Vec::new();
        compute(legit, ChainState::default(), |ev| {
            out.push(ev);
            Ok(())
        })
        .unwrap();
        out[0].hash = String::new();
        out[0].hash_prev = String::new();

        let report = verify_stream(out, &ChainState::default());
        assert!(!report.tampered.is_empty());
    }
}
