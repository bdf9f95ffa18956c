//! `run_log` sink: one NDJSON summary record per pipeline stage invocation.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use auditchain_model::error::AuditResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StageSummary {
    pub stage: &'static str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub events_in: u64,
    pub events_out: u64,
    pub errors: u64,
    pub chain_index_before: Option<u64>,
    pub chain_index_after: Option<u64>,
}

/// Append one summary record to the run log, if a path was configured.
/// A missing `path` is a no-op — the run log is optional.
pub fn record(path: Option<&Path>, summary: &StageSummary) -> AuditResult<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(summary)?;
    writeln!(file, "{line}")?;
    Ok(())
}
