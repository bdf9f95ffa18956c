//! # auditchain-model
//!
//! Shared types for the auditchain pipeline: the event shapes that cross
//! every stage, chain state and checkpoint records, and the unified error
//! type. No business logic lives in this crate — only data definitions.

pub mod chain;
pub mod error;
pub mod event;
pub mod schema;

#[cfg(test)]
mod tests {
    use super::*;
    use chain::{zero_hash, ChainState};
    use event::{DbSystem, Event, RiskLevel};
    use schema::ColumnRef;

    #[test]
    fn zero_hash_is_64_hex_zeros() {
        let z = zero_hash();
        assert_eq!(z.len(), 64);
        assert!(z.chars().all(|c| c == '0'));
    }

    #[test]
    fn chain_state_default_is_fresh_chain() {
        let state = ChainState::default();
        assert_eq!(state.last_chain_index, 0);
        assert_eq!(state.last_head_hash, zero_hash());
    }

    #[test]
    fn chain_state_normalises_empty_head_hash() {
        let state = ChainState {
            last_chain_index: 3,
            last_head_hash: String::new(),
        }
        .normalised();
        assert_eq!(state.last_head_hash, zero_hash());
    }

    #[test]
    fn chain_state_serde_round_trips_with_pascal_case_keys() {
        let state = ChainState {
            last_chain_index: 5,
            last_head_hash: "ab".repeat(32),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("LastChainIndex"));
        assert!(json.contains("LastHeadHash"));
        let decoded: ChainState = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn risk_level_orders_low_to_critical() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn column_ref_identifier_joins_table_and_column() {
        let col = ColumnRef::new("patient", "ssn");
        assert_eq!(col.identifier(), "patient.ssn");
    }

    #[test]
    fn event_error_event_sets_query_type_error() {
        let ev = Event::error_event(
            "evt-1".to_string(),
            "2025-01-01T00:00:00Z".to_string(),
            DbSystem::Postgres,
            Some("alice".to_string()),
            Some("SELECT 1".to_string()),
            "enrichment",
            "schema miss",
        );
        assert_eq!(ev.query_type, "ERROR");
        assert_eq!(ev.event_id, "evt-1");
        let err = ev.extra.get("error").unwrap();
        assert_eq!(err["phase"], "enrichment");
        assert_eq!(err["message"], "schema miss");
    }

    #[test]
    fn db_system_serialises_lowercase() {
        let json = serde_json::to_string(&DbSystem::Postgres).unwrap();
        assert_eq!(json, "\"postgres\"");
        let json = serde_json::to_string(&DbSystem::Mysql).unwrap();
        assert_eq!(json, "\"mysql\"");
    }
}
