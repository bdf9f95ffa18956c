//! Parser for pgAudit's `SESSION` log-line format.
//!
//! A pgAudit session line, stripped of its `AUDIT: ` prefix, is a
//! comma-separated record:
//!
//! ```text
//! SESSION,<session_id>,<session_line>,<statement_id>,<substatement_id>,
//! <class>,<command>,<object_type>,<object_name>,<statement>,<parameter>
//! ```
//!
//! This is not a SQL parser — table/column extraction is a lightweight token
//! scan over the statement text, sufficient to find `FROM`/`UPDATE`/`INTO`
//! targets, a `SELECT`/`SET`/`INSERT` column list, and a `WHERE` clause.
//! Anything the scan cannot confidently attribute is left out rather than
//! guessed at.

use auditchain_model::event::{DbSystem, Event};

use crate::registry::{LineParser, ParseOutcome};

pub struct PgAuditParser;

const EXPECTED_FIELDS: usize = 11;

impl LineParser for PgAuditParser {
    fn parse_line(&self, line: &str) -> ParseOutcome {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ParseOutcome::Skip;
        }

        let body = trimmed.strip_prefix("AUDIT: ").unwrap_or(trimmed);
        let fields: Vec<&str> = split_csv_record(body);
        if fields.len() < EXPECTED_FIELDS {
            return ParseOutcome::Error {
                message: format!(
                    "pgAudit line has {} fields, expected at least {EXPECTED_FIELDS}",
                    fields.len()
                ),
            };
        }
        if fields[0] != "SESSION" {
            return ParseOutcome::Skip;
        }

        let command = fields[6].trim();
        let statement = fields[9].trim();
        if command.is_empty() || statement.is_empty() {
            return ParseOutcome::Error {
                message: "pgAudit line missing command or statement text".to_string(),
            };
        }

        let query_type = classify_command(command);
        let tables = extract_tables(statement);
        let columns = extract_columns(&query_type, statement);
        let where_present = statement.to_ascii_uppercase().contains("WHERE");

        ParseOutcome::Event(Event {
            event_id: format!("{}:{}", fields[1], fields[3]),
            timestamp: String::new(),
            db_system: DbSystem::Postgres,
            query_type,
            db_user: None,
            db_name: None,
            raw_query: Some(statement.to_string()),
            tables: if tables.is_empty() { None } else { Some(tables) },
            columns: if columns.is_empty() { None } else { Some(columns) },
            where_present: Some(where_present),
            row_estimate: None,
            extra: serde_json::Map::new(),
        })
    }
}

fn classify_command(command: &str) -> String {
    match command.to_ascii_uppercase().as_str() {
        "SELECT" => "SELECT".to_string(),
        "INSERT" => "INSERT".to_string(),
        "UPDATE" => "UPDATE".to_string(),
        "DELETE" => "DELETE".to_string(),
        other => other.to_string(),
    }
}

/// Scan for the table name following `FROM`, `UPDATE`, or `INTO` keywords.
fn extract_tables(statement: &str) -> Vec<String> {
    let tokens: Vec<&str> = statement.split_whitespace().collect();
    let mut tables = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let upper = token.to_ascii_uppercase();
        if matches!(upper.as_str(), "FROM" | "UPDATE" | "INTO") {
            if let Some(next) = tokens.get(i + 1) {
                let table = next.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '.');
                if !table.is_empty() {
                    tables.push(table.to_string());
                }
            }
        }
    }
    tables
}

/// Extract the column list a statement references, dispatching on query
/// type: the `SELECT` list, the `SET` targets of an `UPDATE`, or the column
/// list of an `INSERT`. `DELETE` has no column list to extract.
fn extract_columns(query_type: &str, statement: &str) -> Vec<String> {
    match query_type {
        "SELECT" => columns_from_select(statement),
        "UPDATE" => columns_from_update(statement),
        "INSERT" => columns_from_insert(statement),
        _ => Vec::new(),
    }
}

fn columns_from_select(statement: &str) -> Vec<String> {
    let upper = statement.to_ascii_uppercase();
    let Some((_, select_end)) = keyword_pos(&upper, "SELECT") else {
        return Vec::new();
    };
    let Some((from_start, _)) = keyword_pos(&upper[select_end..], "FROM") else {
        return Vec::new();
    };
    split_columns(statement[select_end..select_end + from_start].trim())
}

fn columns_from_update(statement: &str) -> Vec<String> {
    let upper = statement.to_ascii_uppercase();
    let Some((_, set_end)) = keyword_pos(&upper, "SET") else {
        return Vec::new();
    };
    let end = keyword_pos(&upper[set_end..], "WHERE")
        .map(|(start, _)| set_end + start)
        .unwrap_or(statement.len());
    statement[set_end..end]
        .trim()
        .split(',')
        .filter_map(|assignment| {
            let col = assignment.split('=').next().unwrap_or("").trim();
            let col = col.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '.');
            (!col.is_empty()).then(|| col.to_string())
        })
        .collect()
}

fn columns_from_insert(statement: &str) -> Vec<String> {
    let upper = statement.to_ascii_uppercase();
    let Some((_, into_end)) = keyword_pos(&upper, "INTO") else {
        return Vec::new();
    };
    let rest = &statement[into_end..];
    let rest_upper = &upper[into_end..];
    let Some(open) = rest.find('(') else {
        return Vec::new();
    };
    if let Some((values_start, _)) = keyword_pos(rest_upper, "VALUES") {
        if open > values_start {
            return Vec::new();
        }
    }
    let Some(close_rel) = rest[open..].find(')') else {
        return Vec::new();
    };
    split_columns(&rest[open + 1..open + close_rel])
}

/// Split a `SELECT` list, `INSERT` column list, or similar on unquoted
/// commas, dropping `*` and stripping `AS`-alias/table-qualifier noise down
/// to a bare identifier.
fn split_columns(list: &str) -> Vec<String> {
    if list.is_empty() || list == "*" {
        return Vec::new();
    }
    list.split(',')
        .filter_map(|part| {
            let name = part.trim().split_whitespace().next().unwrap_or("");
            let name = name.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '.');
            (!name.is_empty() && name != "*").then(|| name.to_string())
        })
        .collect()
}

/// Find a keyword as a whole word (not a substring of a larger identifier),
/// returning its `(start, end)` byte offsets.
fn keyword_pos(upper: &str, keyword: &str) -> Option<(usize, usize)> {
    let mut search_from = 0;
    while let Some(rel) = upper[search_from..].find(keyword) {
        let start = search_from + rel;
        let end = start + keyword.len();
        let before_ok = start == 0 || !upper.as_bytes()[start - 1].is_ascii_alphanumeric();
        let after_ok = end == upper.len() || !upper.as_bytes()[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some((start, end));
        }
        search_from = start + 1;
    }
    None
}

/// Split a pgAudit CSV record on unquoted commas; fields may be wrapped in
/// double quotes and contain embedded commas.
fn split_csv_record(body: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let bytes = body.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                fields.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&body[start..]);
    fields
}
