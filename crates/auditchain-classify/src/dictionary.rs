//! Sensitivity dictionary: per-category positive rules and a shared negative
//! rule list, compiled eagerly so a single bad regex is fatal at load time
//! rather than discovered mid-run.

use std::collections::BTreeMap;

use auditchain_model::error::{AuditError, AuditResult};
use regex::Regex;
use serde::Deserialize;

const NEGATIVE_KEY: &str = "Negative";

/// One positive classification rule within a category.
#[derive(Debug, Clone, Deserialize)]
pub struct PositiveRuleConfig {
    pub regex: String,
    pub expected_types: Vec<String>,
    #[serde(default)]
    pub sample_pattern: Option<String>,
}

/// One negative (suppression) rule, shared across all categories.
#[derive(Debug, Clone, Deserialize)]
pub struct NegativeRuleConfig {
    pub regex: String,
    pub reason: String,
}

/// A compiled positive rule, regex already built.
pub struct PositiveRule {
    pub regex: Regex,
    pub expected_types: Vec<String>,
}

/// A compiled negative rule.
pub struct NegativeRule {
    pub regex: Regex,
    pub reason: String,
}

/// The compiled sensitivity dictionary: category -> ordered positive rules,
/// plus a shared negative rule list applied before any positive rule.
pub struct SensitivityDictionary {
    pub categories: BTreeMap<String, Vec<PositiveRule>>,
    pub negative: Vec<NegativeRule>,
}

/// Result of testing one column identifier against the dictionary.
pub enum ColumnVerdict {
    /// The column matched a category's positive rule with a compatible type.
    Matched {
        category: String,
        rule_index: usize,
    },
    /// A negative rule suppressed the column before any positive rule ran.
    Suppressed { reason: String },
    /// No rule matched at all.
    NoMatch,
}

impl SensitivityDictionary {
    /// Parse and compile a dictionary from its JSON representation.
    ///
    /// Every regex is compiled immediately; the first invalid one is
    /// returned as a fatal `AuditError::Classification`. At least one
    /// positive category must be present and every positive rule must
    /// declare at least one expected type.
    pub fn from_json(json: &str) -> AuditResult<Self> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| AuditError::Classification {
                reason: format!("invalid dictionary JSON: {e}"),
            })?;

        let mut categories = BTreeMap::new();
        let mut negative = Vec::new();

        for (key, value) in raw {
            if key == NEGATIVE_KEY {
                let rules: Vec<NegativeRuleConfig> =
                    serde_json::from_value(value).map_err(|e| AuditError::Classification {
                        reason: format!("invalid Negative rule list: {e}"),
                    })?;
                for rule in rules {
                    let regex = Regex::new(&rule.regex).map_err(|e| AuditError::Classification {
                        reason: format!("bad regex in Negative rule '{}': {e}", rule.regex),
                    })?;
                    negative.push(NegativeRule {
                        regex,
                        reason: rule.reason,
                    });
                }
                continue;
            }

            let rules: Vec<PositiveRuleConfig> =
                serde_json::from_value(value).map_err(|e| AuditError::Classification {
                    reason: format!("invalid rule list for category '{key}': {e}"),
                })?;
            let mut compiled = Vec::with_capacity(rules.len());
            for rule in rules {
                if rule.expected_types.is_empty() {
                    return Err(AuditError::Classification {
                        reason: format!(
                            "category '{key}' has a rule with no expected_types: {}",
                            rule.regex
                        ),
                    });
                }
                let regex = Regex::new(&rule.regex).map_err(|e| AuditError::Classification {
                    reason: format!("bad regex in category '{key}' ('{}'): {e}", rule.regex),
                })?;
                compiled.push(PositiveRule {
                    regex,
                    expected_types: rule.expected_types,
                });
            }
            categories.insert(key, compiled);
        }

        if categories.is_empty() {
            return Err(AuditError::Classification {
                reason: "sensitivity dictionary has no positive categories".to_string(),
            });
        }

        Ok(SensitivityDictionary {
            categories,
            negative,
        })
    }

    /// Classify a single `(table, column)` reference against the dictionary.
    /// `resolved_type` comes from the schema resolver; `None` means the
    /// column's type could not be determined.
    ///
    /// Negative rules match against the full `table.column` identifier, so a
    /// table-level prefix (e.g. `tmp_`) can suppress every column in it.
    /// Positive rules match against the bare column name. Negative rules are
    /// applied first and take precedence over any positive match. Within a
    /// category, rules are tried in declaration order and the first
    /// matching, type-compatible rule wins.
    pub fn classify_column(
        &self,
        table: &str,
        column: &str,
        resolved_type: Option<&str>,
    ) -> Vec<ColumnVerdict> {
        let identifier = format!("{table}.{column}");
        for negative in &self.negative {
            if negative.regex.is_match(&identifier) {
                return vec![ColumnVerdict::Suppressed {
                    reason: negative.reason.clone(),
                }];
            }
        }

        let mut verdicts = Vec::new();
        for (category, rules) in &self.categories {
            for (idx, rule) in rules.iter().enumerate() {
                if !rule.regex.is_match(column) {
                    continue;
                }
                let type_ok = resolved_type
                    .map(|t| {
                        rule.expected_types
                            .iter()
                            .any(|expected| expected.eq_ignore_ascii_case(t))
                    })
                    .unwrap_or(false);
                if type_ok {
                    verdicts.push(ColumnVerdict::Matched {
                        category: category.clone(),
                        rule_index: idx,
                    });
                    break;
                }
            }
        }

        if verdicts.is_empty() {
            vec![ColumnVerdict::NoMatch]
        } else {
            verdicts
        }
    }
}
