//! The enricher: per-event orchestration that turns a parsed [`Event`] into
//! an [`EnrichedEvent`], consulting the schema resolver, sensitivity
//! dictionary, and risk policy in turn.
//!
//! Failures never abort the run — they are recovered locally per event, per
//! the pipeline's error-handling design: a failure produces an error event,
//! which is always emitted, never dropped.

use std::collections::BTreeSet;

use auditchain_classify::{ColumnVerdict, RiskPolicy, SchemaCatalog, SensitivityDictionary};
use auditchain_model::event::{EnrichedEvent, Event, RiskLevel};
use auditchain_model::schema::ColumnRef;
use tracing::debug;

/// Row-count estimate above which a query is treated as bulk, absent an
/// explicit `UPDATE`/`DELETE`-without-`WHERE` signal. Matches the pipeline's
/// documented default.
pub const DEFAULT_BULK_ROW_THRESHOLD: u64 = 1000;

/// What the enricher did with one input event.
pub enum EnrichOutcome {
    /// Classification succeeded and produced categories (or `emit_unknown`
    /// is set, so an empty-category event is still emitted).
    Enriched(EnrichedEvent),
    /// Classification found no categories and `emit_unknown` is false.
    Dropped,
    /// Something about the event prevented classification; an error event is
    /// emitted in its place rather than the original.
    Error(Event),
}

/// Per-event classification orchestrator.
pub struct Enricher<'a> {
    dictionary: &'a SensitivityDictionary,
    risk_policy: &'a RiskPolicy,
    schema: &'a SchemaCatalog,
    bulk_row_threshold: u64,
    emit_unknown: bool,
    schema_miss_fatal: bool,
}

impl<'a> Enricher<'a> {
    pub fn new(
        dictionary: &'a SensitivityDictionary,
        risk_policy: &'a RiskPolicy,
        schema: &'a SchemaCatalog,
        bulk_row_threshold: u64,
        emit_unknown: bool,
        schema_miss_fatal: bool,
    ) -> Self {
        Enricher {
            dictionary,
            risk_policy,
            schema,
            bulk_row_threshold,
            emit_unknown,
            schema_miss_fatal,
        }
    }

    /// Classify one event. Never returns an `Err` — failures are folded into
    /// [`EnrichOutcome::Error`] so the caller can always emit something.
    pub fn enrich(&self, event: Event) -> EnrichOutcome {
        let refs = extract_column_refs(&event);

        let mut categories = BTreeSet::new();
        let mut debug_entries = serde_json::Map::new();

        for column_ref in &refs {
            let resolved_type = self.schema.resolve(&column_ref.table, &column_ref.column);

            if resolved_type.is_none() && self.schema_miss_fatal {
                return EnrichOutcome::Error(Event::error_event(
                    event.event_id,
                    event.timestamp,
                    event.db_system,
                    event.db_user,
                    event.raw_query,
                    "enrichment",
                    &format!("schema miss for {}", column_ref.identifier()),
                ));
            }

            let verdicts =
                self.dictionary
                    .classify_column(&column_ref.table, &column_ref.column, resolved_type);

            for verdict in verdicts {
                match verdict {
                    ColumnVerdict::Matched {
                        category,
                        rule_index,
                    } => {
                        debug!(column = %column_ref.identifier(), %category, rule_index, "matched");
                        categories.insert(category.clone());
                        debug_entries.insert(
                            format!("{}:{category}", column_ref.identifier()),
                            serde_json::json!({ "rule_index": rule_index }),
                        );
                    }
                    ColumnVerdict::Suppressed { reason } => {
                        debug_entries.insert(
                            column_ref.identifier(),
                            serde_json::json!({ "suppressed": reason }),
                        );
                    }
                    ColumnVerdict::NoMatch => {}
                }
            }
        }

        if !categories.is_empty() && !self.risk_policy.covers(categories.iter()) {
            return EnrichOutcome::Error(Event::error_event(
                event.event_id,
                event.timestamp,
                event.db_system,
                event.db_user,
                event.raw_query,
                "enrichment",
                "matched category missing from risk policy base levels",
            ));
        }

        let bulk = is_bulk(&event, self.bulk_row_threshold);
        let risk_level = self.risk_policy.risk_for(&categories, bulk);

        if categories.is_empty() && !self.emit_unknown {
            return EnrichOutcome::Dropped;
        }

        EnrichOutcome::Enriched(EnrichedEvent {
            event,
            categories,
            risk_level,
            bulk,
            debug: if debug_entries.is_empty() {
                None
            } else {
                Some(debug_entries)
            },
        })
    }
}

/// Extract `(table, column)` references from an event's structured fields.
///
/// Each entry in `columns` may already be table-qualified (`table.column`);
/// otherwise, if the event names exactly one table, the column is paired
/// with it. An unqualified column with zero or multiple candidate tables
/// cannot be attributed and is skipped — it is not classifiable without
/// risking a false attribution.
fn extract_column_refs(event: &Event) -> Vec<ColumnRef> {
    let columns = event.columns.clone().unwrap_or_default();
    let tables = event.tables.clone().unwrap_or_default();

    columns
        .into_iter()
        .filter_map(|col| {
            if let Some((table, column)) = col.split_once('.') {
                Some(ColumnRef::new(table, column))
            } else if tables.len() == 1 {
                Some(ColumnRef::new(tables[0].clone(), col))
            } else {
                None
            }
        })
        .collect()
}

/// A query is bulk when it is an `UPDATE`/`DELETE` with no reported `WHERE`
/// predicate, or when its row estimate exceeds `threshold`. Bulk status
/// never lowers risk; combination rules may escalate it.
fn is_bulk(event: &Event, threshold: u64) -> bool {
    let unpredicated_mutation = matches!(event.query_type.as_str(), "UPDATE" | "DELETE")
        && event.where_present == Some(false);
    let over_threshold = event.row_estimate.map(|n| n > threshold).unwrap_or(false);
    unpredicated_mutation || over_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditchain_model::event::DbSystem;

    fn dict() -> SensitivityDictionary {
        SensitivityDictionary::from_json(
            r#"{
                "PII": [{"regex": "(?i)^ssn$", "expected_types": ["VARCHAR"]}],
                "Negative": [{"regex": "tmp_", "reason": "temp table"}]
            }"#,
        )
        .unwrap()
    }

    fn risk() -> RiskPolicy {
        RiskPolicy::from_json(
            r#"{"base": {"PII": "high"}, "combinations": {}, "default": "low"}"#,
        )
        .unwrap()
    }

    fn schema() -> SchemaCatalog {
        SchemaCatalog::from_csv_str("schema,table,column,type\n,patient,ssn,VARCHAR\n", true)
            .unwrap()
    }

    fn base_event(query_type: &str) -> Event {
        Event {
            event_id: "e1".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            db_system: DbSystem::Postgres,
            query_type: query_type.to_string(),
            db_user: None,
            db_name: None,
            raw_query: None,
            tables: Some(vec!["patient".to_string()]),
            columns: Some(vec!["ssn".to_string()]),
            where_present: Some(true),
            row_estimate: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn classifies_pii_column_with_base_risk_level() {
        let (d, r, s) = (dict(), risk(), schema());
        let enricher = Enricher::new(&d, &r, &s, DEFAULT_BULK_ROW_THRESHOLD, false, false);
        match enricher.enrich(base_event("SELECT")) {
            EnrichOutcome::Enriched(enriched) => {
                assert!(enriched.categories.contains("PII"));
                assert_eq!(enriched.risk_level, RiskLevel::High);
            }
            _ => panic!("expected Enriched"),
        }
    }

    #[test]
    fn negative_rule_suppresses_and_records_debug_reason() {
        let (d, r, s) = (dict(), risk(), schema());
        let enricher = Enricher::new(&d, &r, &s, DEFAULT_BULK_ROW_THRESHOLD, true, false);
        let mut event = base_event("SELECT");
        event.tables = Some(vec!["tmp_patient".to_string()]);
        match enricher.enrich(event) {
            EnrichOutcome::Enriched(enriched) => {
                assert!(enriched.categories.is_empty());
                assert_eq!(enriched.risk_level, RiskLevel::Low);
                assert!(enriched.debug.unwrap().contains_key("tmp_patient.ssn"));
            }
            _ => panic!("expected Enriched with empty categories"),
        }
    }

    #[test]
    fn unknown_event_dropped_when_emit_unknown_false() {
        let (d, r, s) = (dict(), risk(), schema());
        let enricher = Enricher::new(&d, &r, &s, DEFAULT_BULK_ROW_THRESHOLD, false, false);
        let mut event = base_event("SELECT");
        event.columns = Some(vec!["unrelated_col".to_string()]);
        match enricher.enrich(event) {
            EnrichOutcome::Dropped => {}
            _ => panic!("expected Dropped"),
        }
    }

    #[test]
    fn update_without_where_is_bulk() {
        let (d, r, s) = (dict(), risk(), schema());
        let enricher = Enricher::new(&d, &r, &s, DEFAULT_BULK_ROW_THRESHOLD, true, false);
        let mut event = base_event("UPDATE");
        event.where_present = Some(false);
        event.columns = None;
        event.tables = None;
        match enricher.enrich(event) {
            EnrichOutcome::Enriched(enriched) => assert!(enriched.bulk),
            _ => panic!("expected Enriched"),
        }
    }

    #[test]
    fn row_estimate_over_threshold_is_bulk() {
        let (d, r, s) = (dict(), risk(), schema());
        let enricher = Enricher::new(&d, &r, &s, 100, true, false);
        let mut event = base_event("SELECT");
        event.row_estimate = Some(5000);
        event.columns = None;
        event.tables = None;
        match enricher.enrich(event) {
            EnrichOutcome::Enriched(enriched) => assert!(enriched.bulk),
            _ => panic!("expected Enriched"),
        }
    }

    #[test]
    fn ambiguous_unqualified_column_with_multiple_tables_is_skipped() {
        let (d, r, s) = (dict(), risk(), schema());
        let enricher = Enricher::new(&d, &r, &s, DEFAULT_BULK_ROW_THRESHOLD, true, false);
        let mut event = base_event("SELECT");
        event.tables = Some(vec!["patient".to_string(), "visit".to_string()]);
        match enricher.enrich(event) {
            EnrichOutcome::Enriched(enriched) => assert!(enriched.categories.is_empty()),
            _ => panic!("expected Enriched with empty categories"),
        }
    }

    #[test]
    fn unresolved_schema_type_is_lenient_by_default() {
        let (d, r, s) = (dict(), risk(), schema());
        let enricher = Enricher::new(&d, &r, &s, DEFAULT_BULK_ROW_THRESHOLD, true, false);
        let mut event = base_event("SELECT");
        event.columns = Some(vec!["no_such_column".to_string()]);
        match enricher.enrich(event) {
            EnrichOutcome::Enriched(enriched) => assert!(enriched.categories.is_empty()),
            _ => panic!("expected Enriched with empty categories"),
        }
    }

    #[test]
    fn unresolved_schema_type_is_fatal_when_configured() {
        let (d, r, s) = (dict(), risk(), schema());
        let enricher = Enricher::new(&d, &r, &s, DEFAULT_BULK_ROW_THRESHOLD, true, true);
        let mut event = base_event("SELECT");
        event.columns = Some(vec!["no_such_column".to_string()]);
        match enricher.enrich(event) {
            EnrichOutcome::Error(error_event) => assert_eq!(error_event.query_type, "ERROR"),
            _ => panic!("expected Error"),
        }
    }
}
