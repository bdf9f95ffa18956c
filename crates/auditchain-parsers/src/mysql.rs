//! Parser for Percona audit plugin JSON lines: one `audit_record` object per
//! line.

use auditchain_model::event::{DbSystem, Event};
use serde::Deserialize;

use crate::registry::{LineParser, ParseOutcome};

pub struct PerconaAuditParser;

#[derive(Debug, Deserialize)]
struct PerconaLine {
    audit_record: AuditRecord,
}

#[derive(Debug, Deserialize)]
struct AuditRecord {
    name: String,
    #[serde(default)]
    command_class: String,
    #[serde(default)]
    db: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    query: String,
    #[serde(default)]
    timestamp: String,
}

impl LineParser for PerconaAuditParser {
    fn parse_line(&self, line: &str) -> ParseOutcome {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ParseOutcome::Skip;
        }

        let parsed: PerconaLine = match serde_json::from_str(trimmed) {
            Ok(p) => p,
            Err(e) => {
                return ParseOutcome::Error {
                    message: format!("invalid Percona audit JSON: {e}"),
                }
            }
        };

        if parsed.audit_record.name != "Query" {
            return ParseOutcome::Skip;
        }

        let query_type = classify_command_class(&parsed.audit_record.command_class);
        let statement = parsed.audit_record.query.trim();
        let where_present = statement.to_ascii_uppercase().contains("WHERE");
        let tables = extract_tables(statement);
        let columns = extract_columns(&query_type, statement);

        ParseOutcome::Event(Event {
            event_id: format!(
                "{}:{}",
                parsed.audit_record.timestamp, parsed.audit_record.query
            ),
            timestamp: parsed.audit_record.timestamp,
            db_system: DbSystem::Mysql,
            query_type,
            db_user: if parsed.audit_record.user.is_empty() {
                None
            } else {
                Some(parsed.audit_record.user)
            },
            db_name: if parsed.audit_record.db.is_empty() {
                None
            } else {
                Some(parsed.audit_record.db)
            },
            raw_query: Some(statement.to_string()),
            tables: if tables.is_empty() { None } else { Some(tables) },
            columns: if columns.is_empty() { None } else { Some(columns) },
            where_present: Some(where_present),
            row_estimate: None,
            extra: serde_json::Map::new(),
        })
    }
}

fn classify_command_class(command_class: &str) -> String {
    match command_class.to_ascii_lowercase().as_str() {
        "select" => "SELECT".to_string(),
        "insert" => "INSERT".to_string(),
        "update" => "UPDATE".to_string(),
        "delete" => "DELETE".to_string(),
        other if other.is_empty() => "SELECT".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

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
