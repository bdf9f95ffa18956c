//! Event shapes that cross the pipeline: raw, enriched, and annotated.
//!
//! Events are unordered string-keyed mappings at the wire boundary (NDJSON).
//! The named fields here capture the contract every stage agrees on; any
//! additional fields a parser attaches ride along in `extra` and are carried
//! through enrichment and chaining untouched.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Source database engine that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbSystem {
    Postgres,
    Mysql,
}

/// A structured audit event prior to classification or chaining.
///
/// `event_id`, `timestamp`, `db_system`, and `query_type` are required by the
/// pipeline; everything else is optional and parser-dependent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: String,
    pub db_system: DbSystem,
    pub query_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_present: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_estimate: Option<u64>,

    /// Fields a parser attached that the core schema does not name.
    /// Preserved through enrichment and chaining, included in canonical bytes.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Event {
    /// Build an error event: the only fields a failed enrichment/parse is
    /// guaranteed to still have are the identifying ones plus the query text.
    pub fn error_event(
        event_id: String,
        timestamp: String,
        db_system: DbSystem,
        db_user: Option<String>,
        raw_query: Option<String>,
        phase: &str,
        message: &str,
    ) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert(
            "error".to_string(),
            serde_json::json!({ "phase": phase, "message": message }),
        );
        Event {
            event_id,
            timestamp,
            db_system,
            query_type: "ERROR".to_string(),
            db_user,
            db_name: None,
            raw_query,
            tables: None,
            columns: None,
            where_present: None,
            row_estimate: None,
            extra,
        }
    }
}

/// Risk level assigned by the risk policy. Ordered low to critical so that
/// "never lowers risk" checks can compare levels directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// An `Event` augmented with classification results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    pub event: Event,

    pub categories: BTreeSet<String>,
    pub risk_level: RiskLevel,
    pub bulk: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Map<String, serde_json::Value>>,
}

/// An `EnrichedEvent` augmented with chain linkage fields.
///
/// Invariant: `hash_prev`, `hash`, and `hash_chain_index` are excluded from
/// the canonical bytes they are themselves derived from.
///
/// The three chain fields default on missing input (`""`, `""`, `0`) rather
/// than failing deserialization outright: a line with no hash fields at all
/// is exactly what a forged or truncated annotated stream looks like, and
/// the verifier — not serde — is the place that turns that into a tamper
/// finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedEvent {
    #[serde(flatten)]
    pub enriched: EnrichedEvent,

    #[serde(default)]
    pub hash_prev: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub hash_chain_index: u64,
}

/// Top-level keys excluded from an event's canonical form when hashing.
pub const CHAIN_FIELDS: [&str; 3] = ["hash_prev", "hash", "hash_chain_index"];
