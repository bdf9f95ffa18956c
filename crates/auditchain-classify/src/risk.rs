//! Risk policy: maps a matched category set to a risk level.

use std::collections::{BTreeMap, BTreeSet};

use auditchain_model::error::{AuditError, AuditResult};
use auditchain_model::event::RiskLevel;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RiskPolicyConfig {
    base: BTreeMap<String, RiskLevel>,
    #[serde(default)]
    combinations: BTreeMap<String, RiskLevel>,
    default: RiskLevel,
}

/// A loaded, ready-to-query risk policy.
pub struct RiskPolicy {
    base: BTreeMap<String, RiskLevel>,
    combinations: BTreeMap<String, RiskLevel>,
    default: RiskLevel,
}

impl RiskPolicy {
    /// Parse a risk policy from JSON. Every category named by the caller's
    /// dictionary must appear in `base`; callers should validate that with
    /// [`RiskPolicy::covers`] once both are loaded.
    pub fn from_json(json: &str) -> AuditResult<Self> {
        let config: RiskPolicyConfig =
            serde_json::from_str(json).map_err(|e| AuditError::Classification {
                reason: format!("invalid risk policy JSON: {e}"),
            })?;
        Ok(RiskPolicy {
            base: config.base,
            combinations: config.combinations,
            default: config.default,
        })
    }

    /// True if every category in `categories` has a `base` entry.
    pub fn covers<'a>(&self, categories: impl IntoIterator<Item = &'a String>) -> bool {
        categories.into_iter().all(|c| self.base.contains_key(c))
    }

    /// Compute the risk level for a matched category set.
    ///
    /// Empty set and not bulk -> `default`. Single category and not bulk ->
    /// its `base` level. Otherwise -> the `combinations` entry for the
    /// canonical (sorted, `+`-joined) key if present, else the highest of
    /// the per-category `base` levels. `bulk` folds a synthetic `Bulk` token
    /// into the key so a policy can escalate e.g. `Bulk+PII` to `critical`;
    /// bulk never lowers a risk level, it only ever adds a lookup candidate.
    pub fn risk_for(&self, categories: &BTreeSet<String>, bulk: bool) -> RiskLevel {
        if categories.is_empty() && !bulk {
            return self.default;
        }
        if categories.len() == 1 && !bulk {
            let only = categories.iter().next().unwrap();
            return self.base.get(only).copied().unwrap_or(self.default);
        }

        let mut keyed = categories.clone();
        if bulk {
            keyed.insert("Bulk".to_string());
        }

        let key = canonical_combination_key(&keyed);
        if let Some(level) = self.combinations.get(&key) {
            return *level;
        }

        categories
            .iter()
            .filter_map(|c| self.base.get(c).copied())
            .max()
            .unwrap_or(self.default)
    }
}

/// Canonicalise a category set into its combination-table key: categories
/// sorted lexicographically and joined with `+`.
pub fn canonical_combination_key(categories: &BTreeSet<String>) -> String {
    categories.iter().cloned().collect::<Vec<_>>().join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy() -> RiskPolicy {
        let json = r#"{
            "base": {"PII": "high", "Financial": "medium"},
            "combinations": {"Financial+PII": "critical"},
            "default": "low"
        }"#;
        RiskPolicy::from_json(json).unwrap()
    }

    #[test]
    fn empty_category_set_uses_default() {
        let policy = sample_policy();
        assert_eq!(policy.risk_for(&BTreeSet::new(), false), RiskLevel::Low);
    }

    #[test]
    fn single_category_uses_base_level() {
        let policy = sample_policy();
        let mut cats = BTreeSet::new();
        cats.insert("PII".to_string());
        assert_eq!(policy.risk_for(&cats, false), RiskLevel::High);
    }

    #[test]
    fn explicit_combination_overrides_max_of_base_levels() {
        let policy = sample_policy();
        let mut cats = BTreeSet::new();
        cats.insert("PII".to_string());
        cats.insert("Financial".to_string());
        assert_eq!(policy.risk_for(&cats, false), RiskLevel::Critical);
    }

    #[test]
    fn bulk_escalates_single_category_via_combination_entry() {
        let json = r#"{
            "base": {"PII": "high"},
            "combinations": {"Bulk+PII": "critical"},
            "default": "low"
        }"#;
        let policy = RiskPolicy::from_json(json).unwrap();
        let mut cats = BTreeSet::new();
        cats.insert("PII".to_string());
        assert_eq!(policy.risk_for(&cats, true), RiskLevel::Critical);
    }

    #[test]
    fn bulk_without_matching_combination_falls_back_to_base_level() {
        let policy = sample_policy();
        let mut cats = BTreeSet::new();
        cats.insert("PII".to_string());
        assert_eq!(policy.risk_for(&cats, true), RiskLevel::High);
    }

    #[test]
    fn bulk_alone_with_no_categories_does_not_lower_below_default() {
        let policy = sample_policy();
        assert_eq!(policy.risk_for(&BTreeSet::new(), true), RiskLevel::Low);
    }

    #[test]
    fn combination_key_is_order_independent() {
        let mut a = BTreeSet::new();
        a.insert("B".to_string());
        a.insert("A".to_string());
        assert_eq!(canonical_combination_key(&a), "A+B");
    }

    #[test]
    fn unmatched_combination_falls_back_to_highest_base_level() {
        let json = r#"{
            "base": {"PII": "high", "PHI": "medium"},
            "combinations": {},
            "default": "low"
        }"#;
        let policy = RiskPolicy::from_json(json).unwrap();
        let mut cats = BTreeSet::new();
        cats.insert("PII".to_string());
        cats.insert("PHI".to_string());
        assert_eq!(policy.risk_for(&cats, false), RiskLevel::High);
    }

    #[test]
    fn covers_detects_missing_base_entry() {
        let policy = sample_policy();
        let names = vec!["PII".to_string(), "Unknown".to_string()];
        assert!(!policy.covers(names.iter()));
    }
}
