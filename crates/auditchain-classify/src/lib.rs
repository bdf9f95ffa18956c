//! # auditchain-classify
//!
//! Loads and queries the three configuration surfaces the enricher consults
//! per event: the sensitivity dictionary (regex rules to categories), the
//! risk policy (category sets to risk levels), and the schema catalog
//! (column types).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use auditchain_classify::{SensitivityDictionary, RiskPolicy, SchemaCatalog};
//!
//! let dict = SensitivityDictionary::from_json(&dict_json)?;
//! let risk = RiskPolicy::from_json(&risk_json)?;
//! let schema = SchemaCatalog::from_csv_path(&schema_path, true)?;
//! ```

pub mod dictionary;
pub mod risk;
pub mod schema_resolver;

pub use dictionary::{ColumnVerdict, NegativeRule, PositiveRule, SensitivityDictionary};
pub use risk::RiskPolicy;
pub use schema_resolver::SchemaCatalog;
