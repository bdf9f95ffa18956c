//! Synthetic audit-log traffic generator.
//!
//! Emits raw pgAudit or Percona audit lines to stdout, cycling through a
//! fixed cast of fictional patients, users, and tables so runs are
//! reproducible without pulling in a random number generator. The mix
//! includes ordinary reads, PII/PHI/financial-column touches, bulk
//! mutations with no `WHERE` clause, and a sprinkling of malformed lines so
//! downstream parsing/enrichment error paths get exercised too.

use std::io::{self, Write};

use chrono::Utc;
use clap::{Parser, ValueEnum};

#[derive(Clone, Copy, ValueEnum)]
enum Dialect {
    Postgres,
    Mysql,
}

#[derive(Parser)]
#[command(name = "workload-gen", about = "Synthetic audit-log line generator")]
struct Cli {
    /// Log dialect to emit.
    #[arg(long, value_enum)]
    dialect: Dialect,

    /// Number of lines to emit.
    #[arg(long, default_value_t = 100)]
    count: u64,

    /// Approximately one line in N is deliberately malformed.
    #[arg(long, default_value_t = 20)]
    malformed_every: u64,

    /// Approximately one line in N is a bulk UPDATE/DELETE with no WHERE clause.
    #[arg(long, default_value_t = 15)]
    bulk_every: u64,
}

struct Patient {
    table: &'static str,
    columns: &'static [&'static str],
}

const TABLES: &[Patient] = &[
    Patient {
        table: "patient",
        columns: &["ssn", "name", "dob", "diagnosis"],
    },
    Patient {
        table: "billing",
        columns: &["credit_card_number", "amount", "account_id"],
    },
    Patient {
        table: "appointment",
        columns: &["patient_id", "provider", "scheduled_at"],
    },
    Patient {
        table: "tmp_patient_import",
        columns: &["ssn", "name"],
    },
];

const USERS: &[&str] = &["alice", "bob", "carol", "svc_etl", "dave"];

fn main() {
    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for i in 0..cli.count {
        let line = match cli.dialect {
            Dialect::Postgres => postgres_line(i, &cli),
            Dialect::Mysql => mysql_line(i, &cli),
        };
        writeln!(out, "{line}").expect("write to stdout");
    }
}

fn is_malformed(i: u64, every: u64) -> bool {
    every > 0 && i % every == every - 1
}

fn is_bulk(i: u64, every: u64) -> bool {
    every > 0 && i % every == every / 2
}

fn table_for(i: u64) -> &'static Patient {
    &TABLES[(i as usize) % TABLES.len()]
}

fn user_for(i: u64) -> &'static str {
    USERS[(i as usize) % USERS.len()]
}

fn query_type_for(i: u64) -> &'static str {
    match i % 4 {
        0 => "SELECT",
        1 => "UPDATE",
        2 => "INSERT",
        _ => "DELETE",
    }
}

fn postgres_line(i: u64, cli: &Cli) -> String {
    if is_malformed(i, cli.malformed_every) {
        return "AUDIT: SESSION,truncated,line".to_string();
    }

    let table = table_for(i);
    let query_type = query_type_for(i);
    let column = table.columns[(i as usize) % table.columns.len()];
    let bulk = is_bulk(i, cli.bulk_every) && matches!(query_type, "UPDATE" | "DELETE");

    let statement = match (query_type, bulk) {
        ("SELECT", _) => format!("SELECT {column} FROM {} WHERE id = {i}", table.table),
        ("UPDATE", true) => format!("UPDATE {} SET {column} = 'redacted'", table.table),
        ("UPDATE", false) => format!("UPDATE {} SET {column} = 'redacted' WHERE id = {i}", table.table),
        ("INSERT", _) => format!("INSERT INTO {} ({column}) VALUES ('x')", table.table),
        ("DELETE", true) => format!("DELETE FROM {}", table.table),
        _ => format!("DELETE FROM {} WHERE id = {i}", table.table),
    };

    format!(
        "AUDIT: SESSION,{i},{i},{i},1,READ,{query_type},TABLE,{},{statement},<none>",
        table.table
    )
}

fn mysql_line(i: u64, cli: &Cli) -> String {
    if is_malformed(i, cli.malformed_every) {
        return "{\"audit_record\":{\"name\":\"Query\",\"query\":".to_string();
    }

    let table = table_for(i);
    let query_type = query_type_for(i);
    let column = table.columns[(i as usize) % table.columns.len()];
    let bulk = is_bulk(i, cli.bulk_every) && matches!(query_type, "UPDATE" | "DELETE");
    let user = user_for(i);
    let timestamp = Utc::now().to_rfc3339();

    let statement = match (query_type, bulk) {
        ("SELECT", _) => format!("SELECT {column} FROM {} WHERE id = {i}", table.table),
        ("UPDATE", true) => format!("UPDATE {} SET {column} = 'redacted'", table.table),
        ("UPDATE", false) => format!("UPDATE {} SET {column} = 'redacted' WHERE id = {i}", table.table),
        ("INSERT", _) => format!("INSERT INTO {} ({column}) VALUES ('x')", table.table),
        ("DELETE", true) => format!("DELETE FROM {}", table.table),
        _ => format!("DELETE FROM {} WHERE id = {i}", table.table),
    };

    let record = serde_json::json!({
        "audit_record": {
            "name": "Query",
            "command_class": query_type.to_ascii_lowercase(),
            "db": "clinic",
            "user": user,
            "query": statement,
            "timestamp": timestamp,
        }
    });
    record.to_string()
}
