//! Schema catalog: loads a CSV column catalog and answers `(table, column)`
//! type lookups for the classifier.

use std::collections::HashMap;
use std::path::Path;

use auditchain_model::error::{AuditError, AuditResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SchemaRow {
    #[serde(default)]
    schema: String,
    table: String,
    column: String,
    #[serde(rename = "type")]
    column_type: String,
}

/// The column catalog, keyed case-insensitively by `(table, column)`.
///
/// `schema` is accepted in the CSV (MySQL-style names may omit it) but is not
/// part of the lookup key — callers identify columns by `table.column` only,
/// matching the sensitivity dictionary's identifier shape.
pub struct SchemaCatalog {
    types: HashMap<(String, String), String>,
    case_insensitive: bool,
}

impl SchemaCatalog {
    /// Load a schema catalog from a CSV file with header
    /// `schema,table,column,type`. Rejects duplicate `(schema,table,column)`
    /// triples and unrecognised header columns.
    pub fn from_csv_path(path: &Path, case_insensitive: bool) -> AuditResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_csv_str(&contents, case_insensitive)
    }

    /// Parse a schema catalog from CSV text.
    pub fn from_csv_str(csv_text: &str, case_insensitive: bool) -> AuditResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv_text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| AuditError::Classification {
                reason: format!("schema catalog: {e}"),
            })?
            .clone();
        const EXPECTED: [&str; 4] = ["schema", "table", "column", "type"];
        for header in headers.iter() {
            if !EXPECTED.contains(&header) {
                return Err(AuditError::Classification {
                    reason: format!("schema catalog: unknown header column '{header}'"),
                });
            }
        }

        let mut types = HashMap::new();
        let mut seen = std::collections::HashSet::new();
        for result in reader.deserialize::<SchemaRow>() {
            let row = result.map_err(|e| AuditError::Classification {
                reason: format!("schema catalog: {e}"),
            })?;
            let dedup_key = (row.schema.clone(), row.table.clone(), row.column.clone());
            if !seen.insert(dedup_key) {
                return Err(AuditError::Classification {
                    reason: format!(
                        "schema catalog: duplicate entry for {}.{}.{}",
                        row.schema, row.table, row.column
                    ),
                });
            }
            let lookup_key = lookup_key(&row.table, &row.column, case_insensitive);
            types.insert(lookup_key, row.column_type);
        }

        Ok(SchemaCatalog {
            types,
            case_insensitive,
        })
    }

    /// Look up a column's declared type. Returns `None` if the column is not
    /// present in the catalog.
    pub fn resolve(&self, table: &str, column: &str) -> Option<&str> {
        let key = lookup_key(table, column, self.case_insensitive);
        self.types.get(&key).map(|s| s.as_str())
    }
}

fn lookup_key(table: &str, column: &str, case_insensitive: bool) -> (String, String) {
    if case_insensitive {
        (table.to_ascii_lowercase(), column.to_ascii_lowercase())
    } else {
        (table.to_string(), column.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "schema,table,column,type\n,patient,ssn,VARCHAR\n,patient,name,VARCHAR\n";

    #[test]
    fn resolves_known_column() {
        let catalog = SchemaCatalog::from_csv_str(CSV, true).unwrap();
        assert_eq!(catalog.resolve("patient", "ssn"), Some("VARCHAR"));
    }

    #[test]
    fn unknown_column_resolves_to_none() {
        let catalog = SchemaCatalog::from_csv_str(CSV, true).unwrap();
        assert_eq!(catalog.resolve("patient", "dob"), None);
    }

    #[test]
    fn case_insensitive_by_default_matches_regardless_of_case() {
        let catalog = SchemaCatalog::from_csv_str(CSV, true).unwrap();
        assert_eq!(catalog.resolve("PATIENT", "SSN"), Some("VARCHAR"));
    }

    #[test]
    fn case_sensitive_mode_rejects_case_mismatch() {
        let catalog = SchemaCatalog::from_csv_str(CSV, false).unwrap();
        assert_eq!(catalog.resolve("PATIENT", "SSN"), None);
    }

    #[test]
    fn duplicate_triple_is_rejected() {
        let csv = "schema,table,column,type\n,patient,ssn,VARCHAR\n,patient,ssn,TEXT\n";
        assert!(SchemaCatalog::from_csv_str(csv, true).is_err());
    }

    #[test]
    fn unknown_header_column_is_rejected() {
        let csv = "schema,table,column,kind\n,patient,ssn,VARCHAR\n";
        assert!(SchemaCatalog::from_csv_str(csv, true).is_err());
    }
}
