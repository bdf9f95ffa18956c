//! Run configuration: a YAML document supplying defaults that CLI flags may
//! override. Every field is optional here — the subcommands apply their own
//! defaults for anything neither the file nor a flag supplies.

use std::path::{Path, PathBuf};

use auditchain_model::error::{AuditError, AuditResult};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub source: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
    pub checkpoint_dir: Option<PathBuf>,
    pub signing_key_path: Option<PathBuf>,
    pub verifying_key_path: Option<PathBuf>,
    pub dictionary_path: Option<PathBuf>,
    pub risk_policy_path: Option<PathBuf>,
    pub schema_path: Option<PathBuf>,
    pub emit_unknown: Option<bool>,
    pub bulk_row_threshold: Option<u64>,
    pub run_log_path: Option<PathBuf>,
    pub case_insensitive: Option<bool>,
    pub schema_miss_fatal: Option<bool>,
    pub log_level: Option<String>,
}

impl RunConfig {
    pub fn from_yaml_path(path: &Path) -> AuditResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| AuditError::Config {
            reason: format!("invalid run configuration at {}: {e}", path.display()),
        })
    }
}

/// Prefer an explicit CLI flag, then the config file's value, then `default`.
pub fn resolve<T>(flag: Option<T>, config: Option<T>, default: T) -> T {
    flag.or(config).unwrap_or(default)
}

/// Like [`resolve`] but for required values with no sensible default — a
/// configuration error if neither flag nor config file supplies it.
pub fn require<T>(flag: Option<T>, config: Option<T>, field: &str) -> AuditResult<T> {
    flag.or(config).ok_or_else(|| AuditError::Config {
        reason: format!("missing required configuration value: {field}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_flag_over_config_over_default() {
        assert_eq!(resolve(Some(1u64), Some(2), 3), 1);
        assert_eq!(resolve(None, Some(2u64), 3), 2);
        assert_eq!(resolve(None, None, 3u64), 3);
    }

    #[test]
    fn require_errors_when_neither_source_supplies_the_value() {
        let result: AuditResult<u64> = require(None, None, "bulk_row_threshold");
        assert!(result.is_err());
    }

    #[test]
    fn empty_yaml_document_parses_to_all_defaults() {
        let config: RunConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.source.is_none());
        assert_eq!(config.emit_unknown, None);
    }
}
